use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Brand and business information gathered from the user.
///
/// Known fields are typed; anything else the UI collects is kept in `extra`
/// and still rendered into prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_selling_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BusinessContext {
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Labelled, non-empty entries in a stable order (known fields first,
    /// then `extra` keys sorted alphabetically).
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let known = [
            ("Business name", &self.business_name),
            ("Industry", &self.industry),
            ("Description", &self.description),
            ("Target audience", &self.target_audience),
            ("Brand voice", &self.brand_voice),
            ("Goals", &self.goals),
            ("Website", &self.website),
        ];
        for (label, value) in known {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                out.push((label.to_string(), v.to_string()));
            }
        }
        if !self.unique_selling_points.is_empty() {
            out.push((
                "Unique selling points".to_string(),
                self.unique_selling_points.join("; "),
            ));
        }

        let mut extra: Vec<(&String, &Value)> = self.extra.iter().collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in extra {
            let rendered = match value {
                Value::Null => continue,
                Value::String(s) if s.trim().is_empty() => continue,
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            out.push((key.clone(), rendered));
        }
        out
    }

    /// Whether every required key (camelCase, as on the wire) has a non-empty value.
    pub fn is_sufficient(&self, required_keys: &[String]) -> bool {
        if required_keys.is_empty() {
            return false;
        }
        let wire = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => return false,
        };
        required_keys.iter().all(|key| match wire.get(key) {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        })
    }

    /// Overlay `other` onto `self`; fields set in `other` win.
    pub fn merge(&mut self, other: BusinessContext) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(business_name, industry, description, target_audience, brand_voice, goals, website);
        if !other.unique_selling_points.is_empty() {
            self.unique_selling_points = other.unique_selling_points;
        }
        self.extra.extend(other.extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(json: Value) -> BusinessContext {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn unknown_keys_land_in_extra() {
        let c = ctx(serde_json::json!({"businessName": "Crumb", "city": "Lyon"}));
        assert_eq!(c.business_name.as_deref(), Some("Crumb"));
        assert_eq!(c.extra.get("city"), Some(&Value::String("Lyon".into())));
    }

    #[test]
    fn sufficiency_requires_every_key() {
        let keys = vec!["businessName".to_string(), "industry".to_string()];
        assert!(!ctx(serde_json::json!({"businessName": "Crumb"})).is_sufficient(&keys));
        assert!(ctx(serde_json::json!({"businessName": "Crumb", "industry": "bakery"}))
            .is_sufficient(&keys));
        assert!(!ctx(serde_json::json!({"businessName": "Crumb", "industry": "  "}))
            .is_sufficient(&keys));
    }

    #[test]
    fn no_required_keys_is_never_sufficient() {
        assert!(!ctx(serde_json::json!({"businessName": "Crumb"})).is_sufficient(&[]));
    }

    #[test]
    fn entries_are_stable() {
        let c = ctx(serde_json::json!({"zeta": "z", "alpha": 1, "industry": "bakery"}));
        let e = c.entries();
        assert_eq!(e[0], ("Industry".to_string(), "bakery".to_string()));
        assert_eq!(e[1].0, "alpha");
        assert_eq!(e[2].0, "zeta");
    }

    #[test]
    fn merge_overlays_set_fields() {
        let mut base = ctx(serde_json::json!({"businessName": "Old", "industry": "bakery"}));
        base.merge(ctx(serde_json::json!({"businessName": "New"})));
        assert_eq!(base.business_name.as_deref(), Some("New"));
        assert_eq!(base.industry.as_deref(), Some("bakery"));
    }
}
