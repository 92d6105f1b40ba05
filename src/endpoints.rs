//! The API endpoints URIs.

/// The root route, which greets visitors to the inn.
pub const ROOT: &str = "/";

/// The route to list and create hunters.
pub const HUNTERS: &str = "/hunters";
/// The route to access a single hunter.
pub const HUNTER: &str = "/hunters/{id}";
/// The route to search, update or delete hunters by name.
pub const HUNTERS_BY_NAME: &str = "/hunters/search/by-name";

/// The route to list and create merchants.
pub const MERCHANTS: &str = "/merchants";
/// The route to access a single merchant.
pub const MERCHANT: &str = "/merchants/{id}";
/// The route to search, update or delete merchants by name.
pub const MERCHANTS_BY_NAME: &str = "/merchants/search/by-name";

/// The route to list and create goods.
pub const GOODS: &str = "/goods";
/// The route to access a single good.
pub const GOOD: &str = "/goods/{id}";
/// The route to search, update or delete goods by name.
pub const GOODS_BY_NAME: &str = "/goods/search/by-name";
/// The route to search, update or delete goods by description.
pub const GOODS_BY_DESCRIPTION: &str = "/goods/search/by-description";
/// The route to search, update or delete goods by price.
pub const GOODS_BY_PRICE: &str = "/goods/search/by-price";
/// The route to search, update or delete goods by stock.
pub const GOODS_BY_STOCK: &str = "/goods/search/by-stock";
/// The route to search, update or delete goods by any field combination.
pub const GOODS_BY_ALL: &str = "/goods/search/by-all";

/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/transactions/{id}";
/// The route to search transactions by buyer name.
pub const TRANSACTIONS_BY_BUYER: &str = "/transactions/search/by-buyer";
/// The route to search transactions by merchant name.
pub const TRANSACTIONS_BY_MERCHANT: &str = "/transactions/search/by-merchant";
/// The route to search transactions by date.
pub const TRANSACTIONS_BY_DATE: &str = "/transactions/search/by-date";
