//! 数据库网关
//!
//! `Gateway` 是 ORM 核心与数据库之间唯一的边界：执行一条参数化语句，返回若干行。
//! `PgGateway` 是基于 sqlx 的 PostgreSQL 实现，每条语句单独建立并关闭一个连接。

use crate::error::{Result, SqlxActiveError};
use crate::value::{Row, Value};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use parking_lot::RwLock;
use bigdecimal::ToPrimitive;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnectOptions, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::types::{BigDecimal, Uuid};
use sqlx::{Column, Connection, Encode, PgConnection, Postgres, Row as _, Type, TypeInfo};
use std::collections::HashMap;
use std::str::FromStr;

/// 列目录查询，`save()` 用它确定可写字段
pub const TABLE_COLUMNS_SQL: &str = "SELECT column_name::text AS column_name FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name::text = $1 ORDER BY ordinal_position";

/// 数据库执行器 trait
///
/// 错误原样向上传播，不重试、不包装。
#[async_trait]
pub trait Gateway: Send + Sync {
    /// 执行参数化 SQL（占位符 `$1, $2, ...` 与 `params` 顺序一一对应）
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// 查询表的列名（按定义顺序）
    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = self.execute(TABLE_COLUMNS_SQL, &[Value::from(table)]).await?;
        Ok(column_names(rows))
    }
}

fn column_names(rows: Vec<Row>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|mut row| match row.shift_remove("column_name") {
            Some(Value::Text(name)) => Some(name),
            _ => None,
        })
        .collect()
}

/// 网关配置
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub database_url: String,
}

impl GatewayConfig {
    /// 校验 URL 协议，只支持 PostgreSQL
    pub fn new(database_url: impl Into<String>) -> Result<Self> {
        let database_url = database_url.into();
        if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
            Ok(Self { database_url })
        } else {
            Err(SqlxActiveError::UnsupportedDatabase(database_url))
        }
    }

    /// 先加载 `.env`（如果存在），再读取 `DATABASE_URL`
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| SqlxActiveError::Config("DATABASE_URL is not set".to_string()))?;
        Self::new(url)
    }
}

/// PostgreSQL 网关
///
/// 不使用连接池：每次 `execute` 打开一个连接，执行完毕后关闭。
/// 表的列名在进程生命周期内缓存，调用 `reload_schema` 清空。
#[derive(Debug)]
pub struct PgGateway {
    options: PgConnectOptions,
    columns: RwLock<HashMap<String, Vec<String>>>,
}

impl PgGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let options = PgConnectOptions::from_str(&config.database_url)?;
        Ok(Self {
            options,
            columns: RwLock::new(HashMap::new()),
        })
    }

    /// 从数据库 URL 创建网关
    pub fn connect(url: &str) -> Result<Self> {
        Self::new(&GatewayConfig::new(url)?)
    }

    /// 从环境变量 `DATABASE_URL` 创建网关
    pub fn from_env() -> Result<Self> {
        Self::new(&GatewayConfig::from_env()?)
    }

    /// 清空列名缓存（表结构变更后调用）
    pub fn reload_schema(&self) {
        self.columns.write().clear();
    }
}

#[async_trait]
impl Gateway for PgGateway {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::debug!(sql, params = params.len(), "executing statement");

        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_value(query, param)?;
        }

        let mut conn = PgConnection::connect_with(&self.options).await?;
        let result = query.fetch_all(&mut conn).await;
        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "failed to close connection");
        }

        result?.iter().map(decode_row).collect()
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let cached = self.columns.read().get(table).cloned();
        if let Some(columns) = cached {
            return Ok(columns);
        }
        let rows = self.execute(TABLE_COLUMNS_SQL, &[Value::from(table)]).await?;
        let columns = column_names(rows);
        self.columns
            .write()
            .insert(table.to_string(), columns.clone());
        Ok(columns)
    }
}

/// 不声明类型的 NULL 参数
///
/// 以 OID 0（unspecified）发送，由服务端按上下文推断列类型，
/// 因此可以写入任意类型的列，也可以出现在 WHERE 中。
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> std::result::Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// 将单个值按 PostgreSQL 原生类型绑定到查询
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Result<Query<'q, Postgres, PgArguments>> {
    let query = match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Timestamp(t) => query.bind(*t),
        Value::Json(j) => query.bind(sqlx::types::Json(j.clone())),
        Value::Array(items) => match classify_array(items)? {
            ArrayParam::Ints(ints) => query.bind(ints),
            ArrayParam::Texts(texts) => query.bind(texts),
            ArrayParam::Bools(bools) => query.bind(bools),
            ArrayParam::Json(json) => query.bind(sqlx::types::Json(json)),
        },
        Value::Row(row) => query.bind(sqlx::types::Json(
            serde_json::to_value(row).map_err(|e| SqlxActiveError::InvalidField(e.to_string()))?,
        )),
    };
    Ok(query)
}

/// 数组参数的绑定形式
#[derive(Debug, PartialEq)]
enum ArrayParam {
    Ints(Vec<i64>),
    Texts(Vec<String>),
    Bools(Vec<bool>),
    Json(serde_json::Value),
}

/// 同质的整数 / 文本 / 布尔数组绑定为 PostgreSQL 数组，其他情况绑定为 JSONB
///
/// 空数组无法推断元素类型，固定按 `INT8[]` 绑定：写入 `TEXT[]` 等其他数组列时
/// 需要在 SQL 中显式转换（例如 `tags = $1::text[]`），或改用 NULL。
fn classify_array(items: &[Value]) -> Result<ArrayParam> {
    if let Some(ints) = items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        return Ok(ArrayParam::Ints(ints));
    }
    if let Some(texts) = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
    {
        return Ok(ArrayParam::Texts(texts));
    }
    let bools: Option<Vec<bool>> = items
        .iter()
        .map(|v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        })
        .collect();
    if let Some(bools) = bools {
        return Ok(ArrayParam::Bools(bools));
    }
    let json = serde_json::to_value(items).map_err(|e| SqlxActiveError::InvalidField(e.to_string()))?;
    Ok(ArrayParam::Json(json))
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut out = Row::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

/// NUMERIC 转为浮点数；超出 f64 表示范围时保留十进制文本
fn numeric_value(decimal: BigDecimal) -> Value {
    match decimal.to_f64() {
        Some(f) if f.is_finite() => Value::Float(f),
        _ => Value::Text(decimal.to_string()),
    }
}

/// 按 PostgreSQL 类型名解码单列；未知类型尝试按文本读取，失败时为 NULL
fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<Value> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.into(),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.into(),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.into(),
        "NUMERIC" => row
            .try_get::<Option<BigDecimal>, _>(index)?
            .map(numeric_value)
            .into(),
        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)?
            .map(|uuid| uuid.to_string())
            .into(),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(index)?.into(),
        "TIMESTAMPTZ" => row.try_get::<Option<DateTime<Utc>>, _>(index)?.into(),
        "TIMESTAMP" => row.try_get::<Option<NaiveDateTime>, _>(index)?.into(),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|d| d.and_time(NaiveTime::MIN))
            .into(),
        "JSON" | "JSONB" => row.try_get::<Option<serde_json::Value>, _>(index)?.into(),
        "INT2[]" => row.try_get::<Option<Vec<i16>>, _>(index)?.into(),
        "INT4[]" => row.try_get::<Option<Vec<i32>>, _>(index)?.into(),
        "INT8[]" => row.try_get::<Option<Vec<i64>>, _>(index)?.into(),
        "BOOL[]" => row.try_get::<Option<Vec<bool>>, _>(index)?.into(),
        "TEXT[]" | "VARCHAR[]" => row.try_get::<Option<Vec<String>>, _>(index)?.into(),
        other => match row.try_get::<Option<String>, _>(index) {
            Ok(text) => text.into(),
            Err(e) => {
                tracing::warn!(column = index, pg_type = other, error = %e, "unsupported column type, reading as NULL");
                Value::Null
            }
        },
    };
    Ok(value)
}
