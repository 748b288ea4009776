use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniAppLeadRequest {
    pub init_data: String,
    pub form: LeadForm,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LeadForm {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 200))]
    pub niche: Option<String>,
    #[validate(length(max = 200))]
    pub contact: Option<String>,
}

impl LeadForm {
    /// Trims every field and turns blank optional fields into `None`.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            name: self.name.trim().to_string(),
            niche: clean(self.niche),
            contact: clean(self.contact),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadCreatedResponse {
    pub ok: bool,
    pub lead_id: uuid::Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_init_data() {
        let req: MiniAppLeadRequest = serde_json::from_value(serde_json::json!({
            "initData": "auth_date=1&hash=00",
            "form": { "name": "Ann", "niche": "coffee", "contact": "@ann" }
        }))
        .unwrap();
        assert_eq!(req.init_data, "auth_date=1&hash=00");
        assert_eq!(req.form.niche.as_deref(), Some("coffee"));
    }

    #[test]
    fn normalized_form_drops_blank_fields() {
        let form = LeadForm {
            name: "  Ann ".into(),
            niche: Some("   ".into()),
            contact: Some(" +100 ".into()),
        }
        .normalized();
        assert_eq!(form.name, "Ann");
        assert_eq!(form.niche, None);
        assert_eq!(form.contact.as_deref(), Some("+100"));
    }

    #[test]
    fn blank_name_fails_validation() {
        let form = LeadForm {
            name: "   ".into(),
            niche: None,
            contact: None,
        }
        .normalized();
        assert!(form.validate().is_err());
    }
}
