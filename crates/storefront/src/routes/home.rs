//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::routes::products::ProductCard;
use crate::state::AppState;

/// Number of popular products shown on the home page.
const FEATURED_PRODUCTS: usize = 4;

/// A step in the "how it works" strip.
#[derive(Clone)]
pub struct HowItWorksStep {
    pub number: u8,
    pub title: &'static str,
    pub body: &'static str,
}

const HOW_IT_WORKS: [HowItWorksStep; 3] = [
    HowItWorksStep {
        number: 1,
        title: "เลือกเครื่องปั๊มนม",
        body: "เลือกรุ่นและระยะเวลาเช่าที่เหมาะกับคุณแม่",
    },
    HowItWorksStep {
        number: 2,
        title: "กรอกข้อมูลและชำระเงิน",
        body: "กรอกที่อยู่จัดส่งและแนบสลิปการโอนเงิน",
    },
    HowItWorksStep {
        number: 3,
        title: "รับเครื่องถึงบ้าน",
        body: "เราจัดส่งเครื่องที่ทำความสะอาดแล้วถึงหน้าบ้าน",
    },
];

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub user: Option<CurrentUser>,
    /// Most booked products.
    pub featured: Vec<ProductCard>,
    pub steps: Vec<HowItWorksStep>,
}

/// Display the home page.
///
/// A store failure still renders the page, without products.
#[instrument(skip(state, user))]
pub async fn home(State(state): State<AppState>, OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
    let featured = state.catalog().featured(FEATURED_PRODUCTS).await.map_or_else(
        |e| {
            tracing::error!("Failed to load featured products: {e}");
            Vec::new()
        },
        |products| {
            products
                .iter()
                .map(|p| ProductCard::new(p, state.images()))
                .collect()
        },
    );

    HomeTemplate {
        user,
        featured,
        steps: HOW_IT_WORKS.to_vec(),
    }
}
