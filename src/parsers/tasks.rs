use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::parsers::{clean_line, csv_items, first_value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    fn parse_or_default(raw: &str) -> Self {
        let token = raw.trim().trim_matches('*').to_uppercase();
        if token.starts_with("LOW") {
            Self::Low
        } else if token.starts_with("HIGH") {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// One planned sub-task out of the planner's decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    /// Canonical id `task_<n>`.
    pub id: String,
    pub title: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub complexity: Complexity,
    pub expertise: String,
}

/// Extract `TASK task_n:` blocks with `Title`, `Description`,
/// `Dependencies` (csv or "none"), `Complexity`, `Expertise` fields.
pub fn parse_plan(text: &str) -> Vec<PlannedTask> {
    let mut tasks: Vec<PlannedTask> = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in text.lines() {
        if let Some(id) = task_header(line) {
            if let Some((id, body)) = current.take() {
                if let Some(task) = build_task(&id, &body.join("\n")) {
                    tasks.push(task);
                }
            }
            current = Some((id, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line.to_string());
        }
    }
    if let Some((id, body)) = current.take()
        && let Some(task) = build_task(&id, &body.join("\n"))
    {
        tasks.push(task);
    }
    tasks
}

/// Match `TASK task_<n>:` (also tolerates `TASK <n>:`).
fn task_header(line: &str) -> Option<String> {
    let cleaned = clean_line(line);
    let (head, rest) = cleaned.split_at_checked(4)?;
    if !head.eq_ignore_ascii_case("TASK") {
        return None;
    }
    let rest = rest.trim_start();
    let ident: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if ident.is_empty() {
        return None;
    }
    let digits: String = ident.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("task_{digits}"))
}

fn build_task(id: &str, body: &str) -> Option<PlannedTask> {
    let title = first_value(body, "TITLE").unwrap_or_default();
    let description = first_value(body, "DESCRIPTION").unwrap_or_default();
    if title.is_empty() && description.is_empty() {
        return None;
    }
    let dependencies = first_value(body, "DEPENDENCIES")
        .map(|raw| {
            if raw.trim().eq_ignore_ascii_case("none") {
                Vec::new()
            } else {
                csv_items(&raw)
                    .into_iter()
                    .map(|d| canonical_task_id(&d))
                    .collect()
            }
        })
        .unwrap_or_default();
    let complexity = first_value(body, "COMPLEXITY")
        .map(|v| Complexity::parse_or_default(&v))
        .unwrap_or(Complexity::Medium);
    let expertise = first_value(body, "EXPERTISE").unwrap_or_default();

    Some(PlannedTask {
        id: id.to_string(),
        title,
        description,
        dependencies,
        complexity,
        expertise,
    })
}

fn canonical_task_id(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        raw.trim().to_string()
    } else {
        format!("task_{digits}")
    }
}

/// Drop self-references and references to unknown ids. Returns the cleaned
/// dependency map keyed by task id.
pub fn clean_dependencies(tasks: &mut [PlannedTask]) -> HashMap<String, Vec<String>> {
    let known: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
    let mut deps = HashMap::new();
    for task in tasks.iter_mut() {
        task.dependencies
            .retain(|d| d != &task.id && known.contains(d));
        deps.insert(task.id.clone(), task.dependencies.clone());
    }
    deps
}
