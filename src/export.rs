use serde_json::Value;

use crate::errors::{CoreError, ErrorKind};

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => csv_quote(s),
        other => other.to_string(),
    }
}

/// Header row from the first record's keys, then one line per record.
/// Records are expected to share one field set; an empty input is an error,
/// not an empty file.
pub fn render_csv(rows: &[Value]) -> Result<String, CoreError> {
    let Some(first) = rows.first().and_then(|r| r.as_object()) else {
        return Err(CoreError::new(ErrorKind::InvalidFormat, "no rows to export"));
    };
    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();

    let mut out = String::new();
    out.push_str(
        &headers
            .iter()
            .map(|h| csv_quote(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for row in rows {
        let Some(obj) = row.as_object() else {
            return Err(CoreError::new(
                ErrorKind::InvalidFormat,
                "export rows must be objects",
            ));
        };
        let line = headers
            .iter()
            .map(|h| obj.get(*h).map(csv_cell).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quotes_only_when_needed() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_quote("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn renders_header_then_rows_in_key_order() {
        let rows = vec![
            json!({ "studentId": 1, "lastName": "Ng", "grade": 7.5 }),
            json!({ "studentId": 2, "lastName": "O'Brien, Jr", "grade": null }),
        ];
        let csv = render_csv(&rows).expect("render");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "studentId,lastName,grade");
        assert_eq!(lines[1], "1,Ng,7.5");
        assert_eq!(lines[2], "2,\"O'Brien, Jr\",");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_input_is_an_error() {
        let e = render_csv(&[]).unwrap_err();
        assert_eq!(e.kind, ErrorKind::InvalidFormat);
    }
}
