//! Shared data models for the GetYourShare REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::encoded::{
    deserialize_encoded_list, deserialize_id, deserialize_lenient_datetime,
    deserialize_lenient_f64,
};

// --- Identity ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Merchant,
    Influencer,
    Commercial,
    Admin,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Merchant => "merchant",
            Role::Influencer => "influencer",
            Role::Commercial => "commercial",
            Role::Admin => "admin",
            Role::Unknown => "unknown",
        }
    }

    /// Only partners that promote products may ask for an affiliate link.
    pub fn can_request_affiliation(&self) -> bool {
        matches!(self, Role::Influencer | Role::Commercial)
    }

    /// Endpoint serving the role-specific profile, if the role has one.
    pub fn profile_endpoint(&self) -> Option<&'static str> {
        match self {
            Role::Influencer => Some("/api/influencers/profile"),
            Role::Commercial => Some("/api/commercials/profile"),
            _ => None,
        }
    }
}

/// The authenticated identity, as returned by `/api/auth/me` and login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl User {
    /// "First Last", trimmed; empty when neither part is known.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

// --- Auth ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login answer: either a full session or a second-factor challenge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoginResponse {
    #[serde(default, alias = "requires2FA")]
    pub requires_2fa: bool,
    #[serde(default)]
    pub temp_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

// --- Marketplace ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Service,
    /// Also every type this client does not know.
    #[default]
    #[serde(other)]
    Product,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FaqItem {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Product {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: ProductKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_encoded_list")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_encoded_list")]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_encoded_list")]
    pub faq: Vec<FaqItem>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub original_price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub discounted_price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub discount_percentage: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub commission_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_views: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_sales: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub total_clicks: Option<f64>,
}

/// `/api/marketplace/products/{id}` answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProductEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub product: Option<Product>,
}

/// `/api/products` answers with either a wrapped or a bare list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ProductListResponse {
    Wrapped {
        #[serde(default)]
        products: Vec<Product>,
    },
    Bare(Vec<Product>),
}

impl ProductListResponse {
    pub fn into_products(self) -> Vec<Product> {
        match self {
            ProductListResponse::Wrapped { products } => products,
            ProductListResponse::Bare(products) => products,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProductFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// A generated affiliate link; either URL may be missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AffiliateLink {
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub full_url: Option<String>,
}

impl AffiliateLink {
    /// The URL to share: the short one when there is one.
    pub fn url(&self) -> Option<&str> {
        self.short_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.full_url.as_deref())
    }
}

/// `POST /api/affiliate-links/generate` answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneratedLinkResponse {
    #[serde(default)]
    pub link: Option<AffiliateLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Review {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReviewsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

/// Review form buffer; also the body of `POST .../review`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewDraft {
    pub rating: u8,
    pub title: String,
    pub comment: String,
}

impl Default for ReviewDraft {
    fn default() -> Self {
        Self {
            rating: 5,
            title: String::new(),
            comment: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AffiliateRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AffiliateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub affiliate_link: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// --- Profiles & AI validation ---

/// Role-specific partner profile (influencer or commercial).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoleProfile {
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub verified_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub bonus_rating: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_encoded_list")]
    pub validation_badges: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoleProfile {
    /// The profile endpoints nest the profile under `profile` or
    /// `commercial`, or return it bare.
    pub fn from_response(body: Value) -> Option<Self> {
        let inner = match body {
            Value::Object(mut map) => {
                let nested = map
                    .remove("profile")
                    .filter(Value::is_object)
                    .or_else(|| map.remove("commercial").filter(Value::is_object));
                nested.unwrap_or(Value::Object(map))
            }
            _ => return None,
        };
        serde_json::from_value(inner).ok()
    }

    pub fn validation_status(&self) -> Option<ValidationStatus> {
        self.verified.then(|| ValidationStatus {
            verified: true,
            verified_at: self.verified_at.clone(),
            confidence_score: self.confidence_score,
            bonus_rating: self.bonus_rating,
            validation_badges: self.validation_badges.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationStatus {
    #[serde(default, alias = "is_verified")]
    pub verified: bool,
    #[serde(default)]
    pub verified_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub bonus_rating: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_encoded_list")]
    pub validation_badges: Vec<String>,
}

/// `/api/influencers/validate-stats` answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidateStatsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(flatten)]
    pub status: ValidationStatus,
}

// --- Contact ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContactCategory {
    #[default]
    General,
    Support,
    MerchantInquiry,
    InfluencerInquiry,
    Partnership,
    BugReport,
    FeatureRequest,
    Complaint,
}

impl ContactCategory {
    pub const ALL: [ContactCategory; 8] = [
        ContactCategory::General,
        ContactCategory::Support,
        ContactCategory::MerchantInquiry,
        ContactCategory::InfluencerInquiry,
        ContactCategory::Partnership,
        ContactCategory::BugReport,
        ContactCategory::FeatureRequest,
        ContactCategory::Complaint,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ContactCategory::General => "Question Générale",
            ContactCategory::Support => "Support Technique",
            ContactCategory::MerchantInquiry => "Question Marchand",
            ContactCategory::InfluencerInquiry => "Question Influenceur",
            ContactCategory::Partnership => "Partenariat",
            ContactCategory::BugReport => "Signaler un Bug",
            ContactCategory::FeatureRequest => "Demande de Fonctionnalité",
            ContactCategory::Complaint => "Réclamation",
        }
    }
}

/// Contact form buffer; also the body of `POST /api/contact/submit`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
    pub category: ContactCategory,
}

impl ContactForm {
    /// Empty form, with name, email and phone taken from the identity.
    pub fn prefilled(user: Option<&User>) -> Self {
        match user {
            Some(user) => Self {
                name: user.display_name(),
                email: user.email.clone(),
                phone: user.phone.clone().unwrap_or_default(),
                ..Self::default()
            },
            None => Self::default(),
        }
    }

    /// Names of the required fields that are blank.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("subject", &self.subject),
            ("message", &self.message),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

// --- Payments ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PaymentStatus {
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub last_payout: Option<String>,
}

/// Body of `PUT /api/influencer/payment-method`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PaymentMethodUpdate {
    pub method: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_with_numeric_id_and_unknown_role() {
        let user: User = serde_json::from_value(json!({
            "id": 42,
            "email": "a@b.com",
            "role": "super_admin",
            "first_name": "Amina"
        }))
        .unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.role, Role::Unknown);
        assert_eq!(user.display_name(), "Amina");
    }

    #[test]
    fn test_login_response_camel_case_flag() {
        let resp: LoginResponse =
            serde_json::from_value(json!({"requires2FA": true, "temp_token": "tmp"})).unwrap();
        assert!(resp.requires_2fa);
        assert_eq!(resp.temp_token.as_deref(), Some("tmp"));
    }

    #[test]
    fn test_product_normalizes_encoded_fields() {
        let product: Product = serde_json::from_value(json!({
            "id": "p1",
            "name": "Casque",
            "type": "service",
            "images": "[\"a.jpg\", \"b.jpg\"]",
            "highlights": "not json",
            "faq": [{"question": "Q?", "answer": "A."}],
            "discount_percentage": "15"
        }))
        .unwrap();
        assert_eq!(product.kind, ProductKind::Service);
        assert_eq!(product.images, vec!["a.jpg", "b.jpg"]);
        assert!(product.highlights.is_empty());
        assert_eq!(product.faq.len(), 1);
        assert_eq!(product.discount_percentage, Some(15.0));
    }

    #[test]
    fn test_product_list_shapes() {
        let wrapped: ProductListResponse =
            serde_json::from_value(json!({"products": [{"id": 1}]})).unwrap();
        assert_eq!(wrapped.into_products().len(), 1);
        let bare: ProductListResponse = serde_json::from_value(json!([{"id": 1}, {"id": 2}])).unwrap();
        assert_eq!(bare.into_products().len(), 2);
    }

    #[test]
    fn test_generated_link_prefers_short_url() {
        let resp: GeneratedLinkResponse = serde_json::from_value(json!({
            "link": {"short_url": "", "full_url": "https://getyourshare.ma/r/abc"}
        }))
        .unwrap();
        assert_eq!(
            resp.link.unwrap().url(),
            Some("https://getyourshare.ma/r/abc")
        );

        let product: Product =
            serde_json::from_value(json!({"id": 3, "total_sales": "12", "total_views": 40}))
                .unwrap();
        assert_eq!(product.total_sales, Some(12.0));
        assert_eq!(product.total_views, Some(40.0));
    }

    #[test]
    fn test_role_profile_nesting() {
        let profile = RoleProfile::from_response(json!({
            "success": true,
            "profile": {"verified": true, "confidence_score": 87, "validation_badges": ["audience"]}
        }))
        .unwrap();
        let status = profile.validation_status().unwrap();
        assert!(status.verified);
        assert_eq!(status.confidence_score, Some(87.0));
        assert_eq!(status.bonus_rating, None);

        let bare = RoleProfile::from_response(json!({"verified": false})).unwrap();
        assert!(bare.validation_status().is_none());
    }

    #[test]
    fn test_contact_categories_are_distinct() {
        let labels: std::collections::HashSet<_> =
            ContactCategory::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels.len(), ContactCategory::ALL.len());
        assert_eq!(
            serde_json::to_value(ContactCategory::BugReport).unwrap(),
            json!("bug_report")
        );
        assert_eq!(ContactCategory::default().label(), "Question Générale");
    }

    #[test]
    fn test_contact_form_required_fields() {
        let form = ContactForm {
            name: "".into(),
            email: "a@b.com".into(),
            subject: "S".into(),
            message: "M".into(),
            ..ContactForm::default()
        };
        assert_eq!(form.missing_required(), vec!["name"]);
        let body = serde_json::to_value(&form).unwrap();
        assert_eq!(body["category"], "general");
    }

    #[test]
    fn test_payment_method_update_flattens_details() {
        let mut details = Map::new();
        details.insert("iban".into(), json!("MA64..."));
        let update = PaymentMethodUpdate {
            method: "bank_transfer".into(),
            details,
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, json!({"method": "bank_transfer", "iban": "MA64..."}));
    }
}
