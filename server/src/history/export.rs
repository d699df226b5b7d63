use crate::history::history::HistoryRecord;

pub const CSV_HEADER: [&str; 10] = ["id", "created_at", "filename", "total_tubes", "pattern", "mpn_per_g", "ci_low", "ci_high", "risk", "tubes"];

pub fn export_csv(records: &[HistoryRecord]) -> Vec<u8> {
    let mut output = String::new();
    push_row(&mut output, CSV_HEADER.iter().map(|field| field.to_string()));
    for record in records {
        let tubes = record.tubes.iter().map(|tube| tube.to_string()).collect::<Vec<String>>().join(",");
        push_row(
            &mut output,
            [
                record.id.to_string(),
                record.created_at.to_rfc3339(),
                record.filename.clone(),
                record.total_tubes.to_string(),
                record.pattern.to_string(),
                record.mpn.to_string(),
                record.ci_low.to_string(),
                record.ci_high.to_string(),
                record.risk.to_string(),
                format!("[{tubes}]"),
            ]
            .into_iter(),
        );
    }
    output.into_bytes()
}

fn push_row<I: Iterator<Item = String>>(output: &mut String, fields: I) {
    let row = fields.map(|field| quote(&field)).collect::<Vec<String>>().join(",");
    output.push_str(&row);
    output.push_str("\r\n");
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
