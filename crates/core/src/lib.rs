pub mod category;
pub mod expense;
pub mod money;

pub use category::Category;
pub use expense::{DraftError, ExpenseDraft};
pub use money::Money;
