//! 按名称注册的关联
//!
//! 每个记录类型在 `Record::relations` 中把关联名映射到一个解析函数，
//! `with_relations` 按名称查找并调用，结果合并进字段的浅拷贝。
//!
//! ```rust,ignore
//! fn articles<'a>(user: &'a User, gateway: &'a dyn Gateway) -> BoxFuture<'a, Result<Value>> {
//!     Box::pin(has_many::<Article>(gateway, "user_id", Value::from(user.id)))
//! }
//!
//! impl Record for User {
//!     fn relations() -> Relations<Self> {
//!         Relations::new().register("articles", articles)
//!     }
//!     // ...
//! }
//! ```

use crate::error::{Result, SqlxActiveError};
use crate::gateway::Gateway;
use crate::query_builder::QueryBuilder;
use crate::traits::{Model, Record};
use crate::value::{Row, Value};
use indexmap::IndexMap;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 关联解析函数：读取关联数据并返回可合并的值
pub type Resolver<M> = for<'a> fn(&'a M, &'a dyn Gateway) -> BoxFuture<'a, Result<Value>>;

/// 关联名到解析函数的有序映射
pub struct Relations<M> {
    resolvers: IndexMap<&'static str, Resolver<M>>,
}

impl<M> Default for Relations<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Relations<M> {
    pub fn new() -> Self {
        Self {
            resolvers: IndexMap::new(),
        }
    }

    /// 注册关联；同名关联会被替换
    pub fn register(mut self, name: &'static str, resolver: Resolver<M>) -> Self {
        self.resolvers.insert(name, resolver);
        self
    }

    pub fn get(&self, name: &str) -> Option<Resolver<M>> {
        self.resolvers.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resolvers.keys().copied()
    }
}

/// 一对多：`R` 中 `foreign_key = id` 的所有行
pub async fn has_many<R: Model>(gateway: &dyn Gateway, foreign_key: &str, id: Value) -> Result<Value> {
    let records = QueryBuilder::<R>::new()
        .where_eq(foreign_key, id)
        .all(gateway)
        .await?;
    Ok(Value::Array(
        records.iter().map(|r| Value::Row(r.to_row())).collect(),
    ))
}

/// 多对一：主键为 `id` 的 `R`，不存在时为 NULL
pub async fn belongs_to<R: Model>(gateway: &dyn Gateway, id: Value) -> Result<Value> {
    if id.is_blank_id() {
        return Ok(Value::Null);
    }
    let record = QueryBuilder::<R>::new()
        .where_eq(R::PK, id)
        .first(gateway)
        .await?;
    Ok(record.map(|r| Value::Row(r.to_row())).unwrap_or(Value::Null))
}

/// 先校验所有关联名，再依次解析并合并
pub async fn with_relations<M: Record>(
    model: &M,
    gateway: &dyn Gateway,
    names: &[&str],
) -> Result<Row> {
    let relations = M::relations();
    let mut resolvers = Vec::with_capacity(names.len());
    for name in names {
        let resolver = relations
            .get(name)
            .ok_or_else(|| SqlxActiveError::InvalidRelation(name.to_string()))?;
        resolvers.push((name.to_string(), resolver));
    }

    let mut row = model.to_row();
    for (name, resolver) in resolvers {
        let value = resolver(model, gateway).await?;
        row.insert(name, value);
    }
    Ok(row)
}
