// derive(Model) 生成的代码使用 `sqlxactive::` 路径，crate 内部测试也需要能解析
extern crate self as sqlxactive;

pub mod crud;
pub mod error;
pub mod fragment;
pub mod gateway;
pub mod query_builder;
pub mod relation;
pub mod traits;
pub mod value;

pub use fragment::{Direction, OrderBy, Statement, Where, WhereIn};
pub use gateway::{Gateway, GatewayConfig, PgGateway};
pub use query_builder::{QueryBuilder, QueryData};
pub use relation::{belongs_to, has_many, BoxFuture, Relations};
pub use traits::{Crud, Model, Record};
pub use value::{FromValue, Row, Value};
pub use error::{Result, SqlxActiveError};

// 重新导出 derive 的所有公共 API（宏）
pub use sqlxactive_derive::*;

// 供使用者实现 `Record` 时直接使用
pub use async_trait::async_trait;
