pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod invoice_items;
pub mod invoices;
pub mod order_items;
pub mod orders;
pub mod payment_methods;
pub mod payment_refunds;
pub mod payments;
pub mod products;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use categories::Entity as Categories;
pub use invoice_items::Entity as InvoiceItems;
pub use invoices::Entity as Invoices;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payment_methods::Entity as PaymentMethods;
pub use payment_refunds::Entity as PaymentRefunds;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use users::Entity as Users;
