//! Source document and response builders

use chrono::NaiveDate;

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// Whole-title document: chapter I, part 1, one section per entry
pub fn title_document(title: u32, sections: &[(&str, &str)]) -> String {
    let body: String = sections
        .iter()
        .map(|(number, text)| {
            format!(
                r#"<DIV8 N="{n}" TYPE="SECTION"><HEAD>§ {n} Heading.</HEAD><P>{t}</P></DIV8>"#,
                n = number,
                t = text
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ECFR><DIV1 N="{title}" TYPE="TITLE"><DIV3 N="I" TYPE="CHAPTER"><DIV5 N="1" TYPE="PART">{body}</DIV5></DIV3></DIV1></ECFR>"#,
        title = title,
        body = body
    )
}

/// Single-section document as returned for a narrowed full-text request
pub fn section_document(section: &str, text: &str) -> String {
    format!(
        r#"<DIV8 N="{s}" TYPE="SECTION"><HEAD>§ {s} Heading.</HEAD><P>{t}</P><CITA>[Citation]</CITA></DIV8>"#,
        s = section,
        t = text
    )
}

/// Version list body; entries are (issue_date, section, name)
pub fn versions_json(title: u32, versions: &[(&str, &str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = versions
        .iter()
        .map(|(issue_date, section, name)| {
            serde_json::json!({
                "issue_date": issue_date,
                "identifier": section,
                "name": name,
                "part": "1",
                "subpart": null,
                "title": title,
            })
        })
        .collect();

    serde_json::json!({ "content_versions": entries }).to_string()
}

/// Ancestry body for chapter I, part 1
pub fn ancestry_json(title: u32, section: &str) -> String {
    serde_json::json!({
        "ancestors": [
            { "type": "title", "identifier": title.to_string() },
            { "type": "chapter", "identifier": "I" },
            { "type": "part", "identifier": "1" },
            { "type": "section", "identifier": section },
        ]
    })
    .to_string()
}
