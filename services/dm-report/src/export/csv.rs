//! CSV 导出器

use errors::AppResult;

use crate::domain::Report;

use super::ReportExporter;

/// 电子表格（CSV）导出器
pub struct CsvExporter;

/// 含分隔符/引号/换行的字段按 RFC 4180 加引号
fn escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

impl ReportExporter for CsvExporter {
    fn media_type(&self) -> &'static str {
        "text/csv"
    }

    fn file_name(&self, report: &Report) -> String {
        let slug = slug(&report.title);
        if slug.is_empty() {
            format!("report-{}.csv", report.id)
        } else {
            format!("{slug}.csv")
        }
    }

    fn render(&self, report: &Report) -> AppResult<Vec<u8>> {
        let mut csv = String::from("id,title,body,tags,row_version,created_at,updated_at\r\n");
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\r\n",
            report.id,
            escape(&report.title),
            escape(&report.body),
            escape(&report.tags.join(";")),
            report.row_version,
            report.audit_info.created_at.to_rfc3339(),
            report.audit_info.updated_at.to_rfc3339(),
        ));
        Ok(csv.into_bytes())
    }
}
