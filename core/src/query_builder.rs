use crate::error::{Result, SqlxActiveError};
use crate::fragment::{
    build_delete_statement, build_select_statement, build_update_statement, OrderBy, Statement,
    Where, WhereIn,
};
use crate::gateway::Gateway;
use crate::traits::Model;
use crate::value::{FromValue, Row, Value};
use std::fmt;
use std::marker::PhantomData;

/// 查询构建器累积的全部状态
///
/// `limit` / `offset` 为 0 表示未设置。
#[derive(Debug, Clone, PartialEq)]
pub struct QueryData {
    pub wheres: Vec<Where>,
    pub where_ins: Vec<WhereIn>,
    pub select: Vec<String>,
    pub limit: u64,
    pub offset: u64,
    pub order_by: Option<OrderBy>,
}

impl Default for QueryData {
    fn default() -> Self {
        Self {
            wheres: Vec::new(),
            where_ins: Vec::new(),
            select: vec!["*".to_string()],
            limit: 0,
            offset: 0,
            order_by: None,
        }
    }
}

impl QueryData {
    fn has_constraints(&self) -> bool {
        !self.wheres.is_empty() || !self.where_ins.is_empty()
    }
}

/// 面向某个模型的链式查询构建器
///
/// 链式方法获取所有权并返回自身；一个构建器只描述一条逻辑查询，不要在多个调用点之间共享。
///
/// ```rust,ignore
/// let users = User::where_op("age", ">", 18)
///     .where_in("status", ["active", "pending"])
///     .order_by(OrderBy::desc("id"))
///     .limit(10)
///     .all(&gateway)
///     .await?;
/// ```
pub struct QueryBuilder<M> {
    data: QueryData,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("table", &M::TABLE)
            .field("data", &self.data)
            .finish()
    }
}

impl<M: Model> Default for QueryBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> QueryBuilder<M> {
    pub fn new() -> Self {
        Self::from_data(QueryData::default())
    }

    /// 使用预先构造好的 `QueryData` 创建构建器
    pub fn from_data(data: QueryData) -> Self {
        Self {
            data,
            _model: PhantomData,
        }
    }

    pub fn data(&self) -> &QueryData {
        &self.data
    }

    /// 追加 `field = value` 条件（AND 连接，按调用顺序）
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.wheres.push(Where::eq(field, value));
        self
    }

    /// 追加 `field op value` 条件；操作符原样拼接，调用方负责其安全性
    pub fn where_op(
        mut self,
        field: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.data.wheres.push(Where::new(field, op, value));
        self
    }

    /// 追加 `field IN (...)` 条件
    pub fn where_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.data.where_ins.push(WhereIn::new(field, values));
        self
    }

    /// 替换投影列表；传入空列表时恢复为 `*`
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.data.select = if fields.is_empty() {
            vec!["*".to_string()]
        } else {
            fields
        };
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.data.limit = n;
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.data.offset = n;
        self
    }

    /// 设置唯一的排序键（后一次调用覆盖前一次）
    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.data.order_by = Some(order.into());
        self
    }

    /// 生成 SELECT 语句
    pub fn to_select(&self) -> Statement {
        build_select_statement(
            M::TABLE,
            &self.data.select,
            &self.data.wheres,
            &self.data.where_ins,
            self.data.offset,
            self.data.order_by.as_ref(),
            self.data.limit,
        )
    }

    /// 生成 COUNT 语句，忽略 select / order_by / limit / offset
    pub fn to_count(&self) -> Statement {
        build_select_statement(
            M::TABLE,
            &["COUNT(*) AS count".to_string()],
            &self.data.wheres,
            &self.data.where_ins,
            0,
            None,
            0,
        )
    }

    /// 生成 `UPDATE ... RETURNING *` 语句
    pub fn to_update(&self, fields: &Row) -> Statement {
        build_update_statement(M::TABLE, fields, &self.data.wheres, &self.data.where_ins)
    }

    /// 生成 DELETE 语句
    pub fn to_delete(&self) -> Statement {
        build_delete_statement(M::TABLE, &self.data.wheres, &self.data.where_ins)
    }

    /// 执行 SELECT，返回原始行
    pub(crate) async fn rows(&self, gateway: &dyn Gateway) -> Result<Vec<Row>> {
        let statement = self.to_select();
        gateway.execute(&statement.sql, &statement.params).await
    }

    /// 执行累积的查询，按数据库返回顺序映射为模型
    pub async fn all(self, gateway: &dyn Gateway) -> Result<Vec<M>> {
        self.rows(gateway)
            .await?
            .into_iter()
            .map(M::from_row)
            .collect()
    }

    /// 强制 `LIMIT 1`，没有匹配行时返回 `None`
    pub async fn first(self, gateway: &dyn Gateway) -> Result<Option<M>> {
        let rows = self.limit(1).all(gateway).await?;
        Ok(rows.into_iter().next())
    }

    /// 强制 `ORDER BY <pk> DESC LIMIT 1`，覆盖之前的排序与 limit
    pub async fn latest(self, gateway: &dyn Gateway) -> Result<Option<M>> {
        self.order_by(OrderBy::desc(M::PK)).first(gateway).await
    }

    /// 统计匹配行数
    pub async fn count(self, gateway: &dyn Gateway) -> Result<u64> {
        let statement = self.to_count();
        let rows = gateway.execute(&statement.sql, &statement.params).await?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.shift_remove("count"))
            .unwrap_or(Value::Null);
        let count = i64::from_value(value)?;
        u64::try_from(count).map_err(|_| SqlxActiveError::TypeMismatch {
            expected: "u64",
            found: format!("int {}", count),
        })
    }

    /// 更新匹配行并返回更新后的模型
    ///
    /// 没有任何条件时更新整张表。
    pub async fn update(self, gateway: &dyn Gateway, fields: Row) -> Result<Vec<M>> {
        if fields.is_empty() {
            return Err(SqlxActiveError::InvalidField(format!(
                "update on '{}' requires at least one field",
                M::TABLE
            )));
        }
        if !self.data.has_constraints() {
            tracing::warn!(table = M::TABLE, "update without constraints affects every row");
        }
        let statement = self.to_update(&fields);
        gateway
            .execute(&statement.sql, &statement.params)
            .await?
            .into_iter()
            .map(M::from_row)
            .collect()
    }

    /// 删除匹配行；没有任何条件时删除整张表
    pub async fn delete(self, gateway: &dyn Gateway) -> Result<()> {
        if !self.data.has_constraints() {
            tracing::warn!(table = M::TABLE, "delete without constraints affects every row");
        }
        let statement = self.to_delete();
        gateway.execute(&statement.sql, &statement.params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Direction;
    use crate::Model;

    #[derive(Debug, Clone, Default, PartialEq, Model)]
    #[model(table = "users")]
    struct User {
        id: i64,
        username: String,
        age: i32,
    }

    fn query() -> QueryBuilder<User> {
        QueryBuilder::new()
    }

    #[test]
    fn test_default_selects_everything() {
        let statement = query().to_select();
        assert_eq!(statement.sql, "SELECT * FROM users");
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_where_chain_keeps_call_order() {
        let statement = query()
            .where_eq("username", "alice")
            .where_op("age", ">=", 21)
            .to_select();
        assert_eq!(
            statement.sql,
            "SELECT * FROM users WHERE username = $1 AND age >= $2"
        );
        assert_eq!(statement.params, vec![Value::from("alice"), Value::Int(21)]);
    }

    #[test]
    fn test_where_then_where_in_share_counter() {
        let statement = query()
            .where_eq("age", 30)
            .where_in("id", [2, 5, 9])
            .to_select();
        assert_eq!(
            statement.sql,
            "SELECT * FROM users WHERE age = $1 AND id IN ($2, $3, $4)"
        );
        assert_eq!(statement.params.len(), 4);
    }

    #[test]
    fn test_select_replaces_projection() {
        let statement = query().select(["id"]).select(["id", "username"]).to_select();
        assert_eq!(statement.sql, "SELECT id, username FROM users");
    }

    #[test]
    fn test_scalar_setters_overwrite() {
        let statement = query()
            .limit(5)
            .limit(10)
            .offset(3)
            .offset(4)
            .order_by("username")
            .order_by(("id", Direction::Desc))
            .to_select();
        assert_eq!(
            statement.sql,
            "SELECT * FROM users ORDER BY id DESC OFFSET 4 LIMIT 10"
        );
    }

    #[test]
    fn test_count_ignores_projection_and_ordering() {
        let statement = query()
            .select(["username"])
            .where_eq("age", 40)
            .order_by(OrderBy::desc("id"))
            .limit(2)
            .to_count();
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) AS count FROM users WHERE age = $1"
        );
    }

    #[test]
    fn test_update_numbers_set_first() {
        let statement = query()
            .where_eq("age", 18)
            .where_in("id", [1, 2])
            .to_update(&crate::row! { "username" => "renamed" });
        assert_eq!(
            statement.sql,
            "UPDATE users SET username = $1 WHERE age = $2 AND id IN ($3, $4) RETURNING *"
        );
        assert_eq!(
            statement.params,
            vec![
                Value::from("renamed"),
                Value::Int(18),
                Value::Int(1),
                Value::Int(2)
            ]
        );
    }

    #[test]
    fn test_delete_statement() {
        let statement = query().where_in("id", [1, 2]).to_delete();
        assert_eq!(statement.sql, "DELETE FROM users WHERE id IN ($1, $2)");
    }

    #[test]
    fn test_from_data() {
        let data = QueryData {
            wheres: vec![Where::eq("username", "bob")],
            limit: 1,
            ..QueryData::default()
        };
        let statement = QueryBuilder::<User>::from_data(data).to_select();
        assert_eq!(
            statement.sql,
            "SELECT * FROM users WHERE username = $1 LIMIT 1"
        );
    }
}
