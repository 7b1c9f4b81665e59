use super::Diagnostic;

pub fn render(d: &Diagnostic) -> String {
    let labels: Vec<serde_json::Value> = d.labels.iter().map(|l| {
        let mut obj = serde_json::json!({
            "row": l.row,
            "col": l.col,
            "message": l.message,
            "primary": l.is_primary,
        });
        if let Some(span) = l.span {
            obj["start"] = serde_json::Value::from(span.start);
            obj["end"] = serde_json::Value::from(span.end);
        }
        obj
    }).collect();

    let mut obj = serde_json::json!({
        "kind": d.kind,
        "message": d.message,
        "labels": labels,
        "notes": d.notes,
    });

    if let Some(primary) = d.primary() {
        obj["row"] = serde_json::Value::from(primary.row);
        obj["col"] = serde_json::Value::from(primary.col);
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| r#"{"kind":"InternalError","message":"could not serialize diagnostic"}"#.to_string())
}
