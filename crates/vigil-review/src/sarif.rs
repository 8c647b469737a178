use vigil_core::{Annotation, AnnotationKind};

use crate::pipeline::ReviewReport;

/// Convert a review report to SARIF v2.1.0 JSON.
///
/// Produces a standalone SARIF log with a single run. Each task becomes a
/// rule (`vigil/<task>`) and each fail, warn or message annotation a result.
/// Markdown blocks have no SARIF counterpart and are left out.
///
/// # Examples
///
/// ```
/// use vigil_review::pipeline::ReviewReport;
/// use vigil_review::sarif::to_sarif;
///
/// let sarif = to_sarif(&ReviewReport::new(None, vec![]));
/// assert_eq!(sarif["version"], "2.1.0");
/// ```
pub fn to_sarif(report: &ReviewReport) -> serde_json::Value {
    let mut rules: Vec<serde_json::Value> = Vec::new();
    let mut results: Vec<serde_json::Value> = Vec::new();

    for outcome in &report.outcomes {
        let rule_id = format!("vigil/{}", outcome.task);
        let mut reported = false;

        for a in &outcome.annotations {
            let Some(level) = sarif_level(a.kind) else {
                continue;
            };
            reported = true;
            results.push(result_entry(&rule_id, level, a));
        }

        if reported {
            rules.push(serde_json::json!({
                "id": rule_id,
                "shortDescription": { "text": format!("{} check", outcome.task) },
            }));
        }
    }

    serde_json::json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "vigil",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": rules
                }
            },
            "results": results
        }]
    })
}

fn result_entry(rule_id: &str, level: &str, a: &Annotation) -> serde_json::Value {
    let mut entry = serde_json::json!({
        "ruleId": rule_id,
        "level": level,
        "message": { "text": &a.body },
    });
    if let Some(file) = &a.file {
        let mut location = serde_json::json!({
            "physicalLocation": {
                "artifactLocation": { "uri": file }
            }
        });
        if let Some(line) = a.line {
            location["physicalLocation"]["region"] = serde_json::json!({ "startLine": line });
        }
        entry["locations"] = serde_json::json!([location]);
    }
    entry
}

fn sarif_level(kind: AnnotationKind) -> Option<&'static str> {
    match kind {
        AnnotationKind::Fail => Some("error"),
        AnnotationKind::Warn => Some("warning"),
        AnnotationKind::Message => Some("note"),
        AnnotationKind::Markdown => None,
    }
}
