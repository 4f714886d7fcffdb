//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use mommypump_core::booking::ResolutionError;
use mommypump_core::catalog::{ALL_TOKEN, Product, RentalOption, SortOrder};
use mommypump_core::{ProductId, RentalOptionId};

use crate::error::{AppError, Result};
use crate::filters;
use crate::images::{ImageHost, ImageTransform};
use crate::middleware::OptionalAuth;
use crate::models::CurrentUser;
use crate::services::BookingServiceError;
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// Product card data for listings.
#[derive(Clone)]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    pub brand_id: String,
    pub type_id: String,
    pub description: String,
    pub monthly_price: String,
    pub image_url: Option<String>,
    pub average_rating: Option<String>,
    pub review_count: usize,
}

impl ProductCard {
    pub fn new(product: &Product, images: &dyn ImageHost) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            brand_id: product.brand_id.to_string(),
            type_id: product.type_id.to_string(),
            description: product.description.clone(),
            monthly_price: product.rental_price.to_string(),
            image_url: product
                .featured_image
                .as_ref()
                .map(|id| images.image_url(id, &ImageTransform::square(400))),
            average_rating: product.average_rating().map(|r| format!("{r:.1}")),
            review_count: product.reviews.len(),
        }
    }
}

/// A rental option in a picker.
#[derive(Clone)]
pub struct OptionView {
    pub id: u32,
    pub label: String,
    pub price: String,
    pub discount: Option<String>,
    pub total: String,
    pub selected: bool,
}

impl OptionView {
    pub fn list(product: &Product, selected: &RentalOption) -> Vec<Self> {
        product
            .rental_options
            .iter()
            .map(|option| Self {
                id: option.id.as_u32(),
                label: option.label(),
                price: option.price.to_string(),
                discount: option.discount.map(|d| d.to_string()),
                total: product.total_for(option).to_string(),
                selected: option.id == selected.id,
            })
            .collect()
    }
}

/// A review on the detail page.
#[derive(Clone)]
pub struct ReviewView {
    pub author: String,
    pub stars: String,
    pub date: String,
    pub comment: String,
}

/// A facet choice on the listing page.
#[derive(Clone)]
pub struct FacetView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

// =============================================================================
// Query Types
// =============================================================================

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub brand: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub sort: Option<String>,
}

/// Rental option selection.
#[derive(Debug, Default, Deserialize)]
pub struct RentalQuery {
    pub rental: Option<u32>,
}

// =============================================================================
// Templates
// =============================================================================

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub user: Option<CurrentUser>,
    pub products: Vec<ProductCard>,
    pub brands: Vec<FacetView>,
    pub product_types: Vec<FacetView>,
    pub sorts: Vec<FacetView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub user: Option<CurrentUser>,
    pub product: ProductCard,
    pub full_description: String,
    pub features: Vec<String>,
    pub specifications: Vec<(String, String)>,
    pub gallery: Vec<String>,
    pub options: Vec<OptionView>,
    pub selected_option: u32,
    pub deposit: String,
    pub total: String,
    pub reviews: Vec<ReviewView>,
    pub available: bool,
}

// =============================================================================
// Handlers
// =============================================================================

fn facets(values: Vec<String>, selected: Option<&str>, label: fn(&str) -> String) -> Vec<FacetView> {
    let mut out = vec![FacetView {
        value: ALL_TOKEN.to_owned(),
        label: "ทั้งหมด".to_owned(),
        selected: selected.is_none(),
    }];
    out.extend(values.into_iter().map(|value| FacetView {
        label: label(&value),
        selected: selected == Some(value.as_str()),
        value,
    }));
    out
}

fn sort_label(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Popularity => "ยอดนิยม",
        SortOrder::PriceLow => "ราคา: ต่ำ-สูง",
        SortOrder::PriceHigh => "ราคา: สูง-ต่ำ",
    }
}

/// Display product listing page.
///
/// Unknown sort values fall back to popularity.
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let sort = query
        .sort
        .as_deref()
        .and_then(|s| s.parse::<SortOrder>().ok())
        .unwrap_or_default();

    let listing = state
        .catalog()
        .browse(query.brand.as_deref(), query.product_type.as_deref(), sort)
        .await?;

    let selected_brand = listing.selected_brand.as_ref().map(|b| b.as_str());
    let selected_type = listing.selected_type.as_ref().map(|t| t.as_str());

    Ok(ProductsIndexTemplate {
        user,
        products: listing
            .products
            .iter()
            .map(|p| ProductCard::new(p, state.images()))
            .collect(),
        brands: facets(
            listing.brands.iter().map(ToString::to_string).collect(),
            selected_brand,
            filters::brand_label,
        ),
        product_types: facets(
            listing.product_types.iter().map(ToString::to_string).collect(),
            selected_type,
            filters::type_label,
        ),
        sorts: SortOrder::ALL
            .into_iter()
            .map(|order| FacetView {
                value: order.as_str().to_owned(),
                label: sort_label(order).to_owned(),
                selected: order == listing.sort,
            })
            .collect(),
    })
}

/// Display product detail page with the option picker and total preview.
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
    Query(query): Query<RentalQuery>,
) -> Result<impl IntoResponse> {
    let product_id = ProductId::new(id);
    let product = state
        .catalog()
        .product(&product_id)
        .await?
        .ok_or_else(|| BookingServiceError::from(ResolutionError::ProductNotFound(product_id.clone())))?;

    let requested = query.rental.map(RentalOptionId::new);
    let option = match requested {
        Some(option_id) => product.rental_option(option_id),
        None => product.default_rental_option(),
    }
    .ok_or_else(|| {
        AppError::from(BookingServiceError::from(ResolutionError::OptionNotFound {
            product: product_id.clone(),
            option: requested.unwrap_or(RentalOptionId::new(1)),
        }))
    })?;

    let images = state.images();
    let gallery = product
        .gallery
        .iter()
        .map(|id| images.image_url(id, &ImageTransform::square(600)))
        .collect();

    Ok(ProductShowTemplate {
        user,
        product: ProductCard::new(&product, images),
        full_description: product.full_description.clone(),
        features: product.features.clone(),
        specifications: product
            .specifications
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        gallery,
        options: OptionView::list(&product, option),
        selected_option: option.id.as_u32(),
        deposit: product.deposit_amount.to_string(),
        total: product.total_for(option).to_string(),
        reviews: product
            .reviews
            .iter()
            .map(|r| ReviewView {
                author: r.author.clone(),
                stars: "★".repeat(usize::from(r.rating)),
                date: r.date.clone(),
                comment: r.comment.clone(),
            })
            .collect(),
        available: product.is_available(),
    })
}
