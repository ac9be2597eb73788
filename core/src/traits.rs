use crate::error::Result;
use crate::fragment::OrderBy;
use crate::gateway::Gateway;
use crate::query_builder::QueryBuilder;
use crate::relation::Relations;
use crate::value::{Row, Value};

/// Model trait 定义了模型的元数据与字段访问
///
/// 通常由 `#[derive(Model)]` 生成：
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Default, sqlxactive::Model)]
/// #[model(table = "users", pk = "id")]
/// pub struct User {
///     pub id: i64,
///     pub username: String,
///     pub created_at: Option<chrono::DateTime<chrono::Utc>>,
/// }
/// ```
pub trait Model: Default + Clone + Send + Sync + 'static {
    /// 表名
    const TABLE: &'static str;
    /// 主键字段名
    const PK: &'static str;
    /// 映射到列的字段名（按声明顺序）
    const FIELDS: &'static [&'static str];

    /// 将所有字段导出为一行
    fn to_row(&self) -> Row;

    /// 按列名写入字段；字段不存在时返回 `Ok(false)`，类型不匹配时返回错误
    fn set_field(&mut self, name: &str, value: Value) -> Result<bool>;

    /// 主键值
    fn id_value(&self) -> Value;

    /// 把一行覆盖到当前模型上，没有对应字段的列被忽略
    fn apply_row(&mut self, row: Row) -> Result<()> {
        for (column, value) in row {
            if !self.set_field(&column, value)? {
                tracing::trace!(table = Self::TABLE, column = %column, "column has no matching field");
            }
        }
        Ok(())
    }

    /// 以默认值构造模型，再覆盖返回的列；未返回的字段保持默认值
    fn from_row(row: Row) -> Result<Self> {
        let mut model = Self::default();
        model.apply_row(row)?;
        Ok(model)
    }
}

/// Crud trait 提供了基本的 CRUD 操作
///
/// 对所有 `Model` 自动实现。静态方法要么直接执行（`all` / `first` / `latest` / `count`），
/// 要么返回预置了一个条件的 `QueryBuilder`。
#[async_trait::async_trait]
pub trait Crud: Model {
    fn query() -> QueryBuilder<Self> {
        QueryBuilder::new()
    }

    fn where_eq(field: impl Into<String>, value: impl Into<Value>) -> QueryBuilder<Self> {
        Self::query().where_eq(field, value)
    }

    fn where_op(
        field: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> QueryBuilder<Self> {
        Self::query().where_op(field, op, value)
    }

    fn where_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> QueryBuilder<Self> {
        Self::query().where_in(field, values)
    }

    fn select<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> QueryBuilder<Self> {
        Self::query().select(fields)
    }

    fn limit(n: u64) -> QueryBuilder<Self> {
        Self::query().limit(n)
    }

    fn offset(n: u64) -> QueryBuilder<Self> {
        Self::query().offset(n)
    }

    fn order_by(order: impl Into<OrderBy>) -> QueryBuilder<Self> {
        Self::query().order_by(order)
    }

    /// 查询整张表
    async fn all(gateway: &dyn Gateway) -> Result<Vec<Self>> {
        Self::query().all(gateway).await
    }

    async fn first(gateway: &dyn Gateway) -> Result<Option<Self>> {
        Self::query().first(gateway).await
    }

    /// 主键最大的一条记录
    async fn latest(gateway: &dyn Gateway) -> Result<Option<Self>> {
        Self::query().latest(gateway).await
    }

    async fn count(gateway: &dyn Gateway) -> Result<u64> {
        Self::query().count(gateway).await
    }

    /// 保存记录：主键为空时插入，否则更新；完成后用返回的行覆盖字段
    async fn save(&mut self, gateway: &dyn Gateway) -> Result<()> {
        crate::crud::save(self, gateway).await
    }

    /// 删除对应的行，不修改内存中的字段
    async fn delete(&self, gateway: &dyn Gateway) -> Result<()> {
        crate::crud::delete(self, gateway).await
    }

    /// 重新读取对应的行；行已不存在时不做任何修改
    async fn refresh(&mut self, gateway: &dyn Gateway) -> Result<()> {
        crate::crud::refresh(self, gateway).await
    }

    async fn exists(&self, gateway: &dyn Gateway) -> Result<bool> {
        crate::crud::exists(self, gateway).await
    }
}

impl<M: Model> Crud for M {}

/// Record trait 是具体记录类型需要提供的扩展点：工厂默认值与关联
#[async_trait::async_trait]
pub trait Record: Model {
    /// 计算工厂的基础字段值
    ///
    /// 可以在这里创建关联记录（例如外键未在 `overrides` 中给出时先创建父记录）。
    async fn factory_defaults(gateway: &dyn Gateway, overrides: &Row) -> Result<Row>;

    /// 按名称注册的关联
    fn relations() -> Relations<Self> {
        Relations::new()
    }

    /// 以 `factory_defaults` 为基础、`overrides` 优先，插入并返回完整记录
    async fn factory(gateway: &dyn Gateway, overrides: Row) -> Result<Self> {
        crate::crud::factory(gateway, overrides).await
    }

    /// 返回字段的浅拷贝，并把每个关联的结果以关联名合并进去
    async fn with_relations(&self, gateway: &dyn Gateway, names: &[&str]) -> Result<Row> {
        crate::relation::with_relations(self, gateway, names).await
    }
}
