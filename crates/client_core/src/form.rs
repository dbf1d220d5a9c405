use std::sync::Arc;

use shared::domain::ProductId;

/// The page elements the price lookup is bound to. Reads return the control's
/// current value; writes replace what the result and error areas display.
pub trait PriceForm: Send + Sync {
    /// Hidden product-id element. `None` means the page is not a product page.
    fn product_id(&self) -> Option<ProductId>;
    fn quantity(&self) -> String;
    fn unit(&self) -> String;
    fn show_total(&self, text: &str);
    fn show_error(&self, text: &str);
    fn clear_error(&self);
}

impl<T: PriceForm + ?Sized> PriceForm for Arc<T> {
    fn product_id(&self) -> Option<ProductId> {
        (**self).product_id()
    }

    fn quantity(&self) -> String {
        (**self).quantity()
    }

    fn unit(&self) -> String {
        (**self).unit()
    }

    fn show_total(&self, text: &str) {
        (**self).show_total(text)
    }

    fn show_error(&self, text: &str) {
        (**self).show_error(text)
    }

    fn clear_error(&self) {
        (**self).clear_error()
    }
}
