//! 记录生命周期操作
//!
//! `Crud` / `Record` trait 的默认方法都委托到这里的函数。

use crate::error::Result;
use crate::fragment::{build_insert_statement, build_update_statement, Where};
use crate::gateway::Gateway;
use crate::query_builder::QueryBuilder;
use crate::traits::{Model, Record};
use crate::value::{Row, Value};
use chrono::Utc;

/// 创建时间列，`save()` 不写入
pub const CREATED_AT: &str = "created_at";
/// 更新时间列，`save()` 的更新路径将其设置为当前时间
pub const UPDATED_AT: &str = "updated_at";

/// 按表的实际列计算 `save()` 要写入的字段
///
/// 排除主键与时间戳列。插入时跳过值为 NULL 的字段，让数据库默认值生效；
/// 更新时写入全部字段（包括 NULL），以便清空可空列。
fn writable_fields<M: Model>(model: &M, columns: &[String], skip_null: bool) -> Row {
    let mut values = model.to_row();
    let mut fields = Row::new();
    for column in columns {
        if column == M::PK || column == CREATED_AT || column == UPDATED_AT {
            continue;
        }
        match values.shift_remove(column.as_str()) {
            None => {}
            Some(Value::Null) if skip_null => {}
            Some(value) => {
                fields.insert(column.clone(), value);
            }
        }
    }
    fields
}

/// 保存模型
///
/// - 主键为空（NULL / 0 / 空字符串）：`INSERT ... RETURNING *`
/// - 否则：`UPDATE ... WHERE pk = $n RETURNING *`
///
/// 两种情况都用返回的行覆盖模型字段（生成的主键、时间戳等）。
pub async fn save<M: Model>(model: &mut M, gateway: &dyn Gateway) -> Result<()> {
    let columns = gateway.table_columns(M::TABLE).await?;
    let id = model.id_value();

    let statement = if id.is_blank_id() {
        build_insert_statement(M::TABLE, &writable_fields(model, &columns, true))
    } else {
        let mut fields = writable_fields(model, &columns, false);
        if columns.iter().any(|c| c == UPDATED_AT) {
            fields.insert(UPDATED_AT.to_string(), Value::Timestamp(Utc::now()));
        }
        if fields.is_empty() {
            return refresh(model, gateway).await;
        }
        build_update_statement(M::TABLE, &fields, &[Where::eq(M::PK, id)], &[])
    };

    let rows = gateway.execute(&statement.sql, &statement.params).await?;
    if let Some(row) = rows.into_iter().next() {
        model.apply_row(row)?;
    }
    Ok(())
}

pub async fn delete<M: Model>(model: &M, gateway: &dyn Gateway) -> Result<()> {
    QueryBuilder::<M>::new()
        .where_eq(M::PK, model.id_value())
        .delete(gateway)
        .await
}

pub async fn refresh<M: Model>(model: &mut M, gateway: &dyn Gateway) -> Result<()> {
    let rows = QueryBuilder::<M>::new()
        .where_eq(M::PK, model.id_value())
        .limit(1)
        .rows(gateway)
        .await?;
    match rows.into_iter().next() {
        Some(row) => model.apply_row(row),
        None => {
            tracing::debug!(table = M::TABLE, "refresh found no row, keeping fields");
            Ok(())
        }
    }
}

pub async fn exists<M: Model>(model: &M, gateway: &dyn Gateway) -> Result<bool> {
    let id = model.id_value();
    if id.is_blank_id() {
        return Ok(false);
    }
    let count = QueryBuilder::<M>::new()
        .where_eq(M::PK, id)
        .count(gateway)
        .await?;
    Ok(count > 0)
}

/// 工厂：`factory_defaults` 的结果被 `overrides` 覆盖后插入
pub async fn factory<M: Record>(gateway: &dyn Gateway, overrides: Row) -> Result<M> {
    let mut fields = M::factory_defaults(gateway, &overrides).await?;
    for (key, value) in overrides {
        fields.insert(key, value);
    }
    fields.retain(|_, value| !value.is_null());

    let statement = build_insert_statement(M::TABLE, &fields);
    let rows = gateway.execute(&statement.sql, &statement.params).await?;
    match rows.into_iter().next() {
        Some(row) => M::from_row(row),
        None => M::from_row(fields),
    }
}
