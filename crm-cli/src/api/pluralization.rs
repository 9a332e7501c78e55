//! Entity set naming for Web API paths

use serde::{Deserialize, Serialize};

/// How a logical entity name is turned into its entity set name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pluralization {
    /// Always append `s` (`incident` -> `incidents`, `coop_notification` -> `coop_notifications`)
    #[default]
    Simple,
    /// English grammar rules, for standard entities like `opportunity`
    English,
}

impl Pluralization {
    pub fn entity_set_name(&self, entity_name: &str) -> String {
        match self {
            Pluralization::Simple => simple_plural(entity_name),
            Pluralization::English => english_plural(entity_name),
        }
    }
}

/// Entity set name as the API paths in this organization use them
pub fn entity_set_name(entity_name: &str) -> String {
    Pluralization::default().entity_set_name(entity_name)
}

fn simple_plural(entity_name: &str) -> String {
    if entity_name.is_empty() {
        return String::new();
    }
    format!("{}s", entity_name)
}

fn english_plural(entity_name: &str) -> String {
    if entity_name.is_empty() {
        return String::new();
    }

    let lower = entity_name.to_lowercase();

    if ["s", "sh", "ch", "x"].iter().any(|end| lower.ends_with(end)) {
        return format!("{}es", entity_name);
    }

    // consonant + y -> ies
    let mut tail = lower.chars().rev();
    if let (Some('y'), Some(before)) = (tail.next(), tail.next()) {
        if !"aeiou".contains(before) {
            return format!("{}ies", &entity_name[..entity_name.len() - 1]);
        }
    }

    format!("{}s", entity_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_appends_s() {
        assert_eq!(entity_set_name("incident"), "incidents");
        assert_eq!(entity_set_name("coop_notification"), "coop_notifications");
        assert_eq!(entity_set_name("subject"), "subjects");
        assert_eq!(entity_set_name("address"), "addresss");
        assert_eq!(entity_set_name(""), "");
    }

    #[test]
    fn test_english_rules() {
        let p = Pluralization::English;
        assert_eq!(p.entity_set_name("contact"), "contacts");
        assert_eq!(p.entity_set_name("address"), "addresses");
        assert_eq!(p.entity_set_name("branch"), "branches");
        assert_eq!(p.entity_set_name("opportunity"), "opportunities");
        assert_eq!(p.entity_set_name("survey"), "surveys");
    }
}
