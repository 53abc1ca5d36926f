pub mod board;
pub mod bulk_request;
pub mod category;
pub mod issue_request;

pub use board::*;
pub use bulk_request::*;
pub use category::*;
pub use issue_request::*;
