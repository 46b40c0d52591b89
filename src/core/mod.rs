pub mod dcql_query;
pub mod error;
pub mod jws;
pub mod sd_jwt;
pub mod util;
