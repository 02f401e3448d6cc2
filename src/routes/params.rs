use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Title,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
    /// Admins and owners may opt in to inactive products.
    pub include_inactive: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DashboardQuery {
    /// Analytics window in days, default 30, capped at 365.
    pub days: Option<i64>,
}

impl DashboardQuery {
    pub fn window(&self) -> i64 {
        self.days.unwrap_or(30).clamp(1, 365)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvoiceListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination { page: None, per_page: None };
        assert_eq!(p.normalize(), (1, 20, 0));

        let p = Pagination { page: Some(0), per_page: Some(1000) };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination { page: Some(3), per_page: Some(25) };
        assert_eq!(p.normalize(), (3, 25, 50));
    }

    #[test]
    fn dashboard_window_bounds() {
        assert_eq!(DashboardQuery { days: None }.window(), 30);
        assert_eq!(DashboardQuery { days: Some(0) }.window(), 1);
        assert_eq!(DashboardQuery { days: Some(9999) }.window(), 365);
    }
}
