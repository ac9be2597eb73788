//! SQL 片段构建
//!
//! 纯函数：把约束列表转换为 `(SQL 片段, 有序绑定参数)`，并推进共享的占位符计数器。
//! 占位符使用 PostgreSQL 风格 `$1, $2, ...`，编号顺序与参数顺序严格一致。

use crate::value::{Row, Value};

/// 生成第 `index` 个占位符（index 从 0 开始，输出 `$index+1`）
pub fn placeholder(index: usize) -> String {
    format!("${}", index + 1)
}

/// 单个 WHERE 条件
///
/// `op` 为 `None` 时等价于二元组 `(field, value)`，使用 `=`；
/// 否则为三元组 `(field, op, value)`，操作符原样输出，不做校验，只有值会被参数化。
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    pub field: String,
    pub op: Option<String>,
    pub value: Value,
}

impl Where {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: None,
            value: value.into(),
        }
    }

    pub fn new(field: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: Some(op.into()),
            value: value.into(),
        }
    }

    pub fn operator(&self) -> &str {
        self.op.as_deref().unwrap_or("=")
    }
}

/// IN 条件：`field IN ($n, $n+1, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct WhereIn {
    pub field: String,
    pub values: Vec<Value>,
}

impl WhereIn {
    pub fn new<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// 排序键；`direction` 为 `None` 时不输出方向（数据库默认升序）
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Option<Direction>,
}

impl OrderBy {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: None,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some(Direction::Asc),
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Some(Direction::Desc),
        }
    }
}

impl From<&str> for OrderBy {
    fn from(field: &str) -> Self {
        OrderBy::new(field)
    }
}

impl From<String> for OrderBy {
    fn from(field: String) -> Self {
        OrderBy::new(field)
    }
}

impl From<(&str, Direction)> for OrderBy {
    fn from((field, direction): (&str, Direction)) -> Self {
        Self {
            field: field.to_string(),
            direction: Some(direction),
        }
    }
}

/// SQL 片段及其绑定参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// 完整的可执行语句
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn push(&mut self, fragment: Fragment) {
        self.sql.push_str(&fragment.sql);
        self.params.extend(fragment.params);
    }
}

/// 生成 ` WHERE a = $1 AND b > $2 ...`，无条件时返回空片段
pub fn build_where_fragment(constraints: &[Where], counter: &mut usize) -> Fragment {
    let mut fragment = Fragment::default();
    for (i, constraint) in constraints.iter().enumerate() {
        fragment.sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        fragment.sql.push_str(&format!(
            "{} {} {}",
            constraint.field,
            constraint.operator(),
            placeholder(*counter)
        ));
        *counter += 1;
        fragment.params.push(constraint.value.clone());
    }
    fragment
}

/// 生成 ` WHERE f1 IN ($n, $n+1) AND f2 IN (...)`
///
/// `has_where` 表示前面已经输出过 WHERE 子句，此时第一个条件以 `AND` 连接。
/// 空值列表渲染为 `IN (NULL)`：语法合法且不匹配任何行。
pub fn build_where_in_fragment(
    constraints: &[WhereIn],
    has_where: bool,
    counter: &mut usize,
) -> Fragment {
    let mut fragment = Fragment::default();
    for (i, constraint) in constraints.iter().enumerate() {
        let keyword = if i == 0 && !has_where { " WHERE " } else { " AND " };
        fragment.sql.push_str(keyword);

        let placeholders = if constraint.values.is_empty() {
            "NULL".to_string()
        } else {
            let mut parts = Vec::with_capacity(constraint.values.len());
            for value in &constraint.values {
                parts.push(placeholder(*counter));
                *counter += 1;
                fragment.params.push(value.clone());
            }
            parts.join(", ")
        };
        fragment
            .sql
            .push_str(&format!("{} IN ({})", constraint.field, placeholders));
    }
    fragment
}

/// 生成 ` SET a = $1, b = $2`（按字段顺序编号）
pub fn build_set_fragment(fields: &Row, counter: &mut usize) -> Fragment {
    let mut fragment = Fragment::default();
    if fields.is_empty() {
        return fragment;
    }
    let mut parts = Vec::with_capacity(fields.len());
    for (column, value) in fields {
        parts.push(format!("{} = {}", column, placeholder(*counter)));
        *counter += 1;
        fragment.params.push(value.clone());
    }
    fragment.sql = format!(" SET {}", parts.join(", "));
    fragment
}

fn push_conditions(
    statement: &mut Statement,
    wheres: &[Where],
    where_ins: &[WhereIn],
    counter: &mut usize,
) {
    let where_fragment = build_where_fragment(wheres, counter);
    let has_where = !where_fragment.is_empty();
    statement.push(where_fragment);
    statement.push(build_where_in_fragment(where_ins, has_where, counter));
}

/// 组装 SELECT 语句
///
/// 子句顺序固定：WHERE、WHERE IN、ORDER BY、OFFSET、LIMIT。
/// `offset` / `limit` 为 0 表示未设置。
pub fn build_select_statement(
    table: &str,
    select: &[String],
    wheres: &[Where],
    where_ins: &[WhereIn],
    offset: u64,
    order_by: Option<&OrderBy>,
    limit: u64,
) -> Statement {
    let columns = if select.is_empty() {
        "*".to_string()
    } else {
        select.join(", ")
    };
    let mut statement = Statement {
        sql: format!("SELECT {} FROM {}", columns, table),
        params: Vec::new(),
    };
    let mut counter = 0;
    push_conditions(&mut statement, wheres, where_ins, &mut counter);

    if let Some(order_by) = order_by {
        statement.sql.push_str(&format!(" ORDER BY {}", order_by.field));
        if let Some(direction) = order_by.direction {
            statement.sql.push(' ');
            statement.sql.push_str(direction.as_sql());
        }
    }
    if offset > 0 {
        statement.sql.push_str(&format!(" OFFSET {}", offset));
    }
    if limit > 0 {
        statement.sql.push_str(&format!(" LIMIT {}", limit));
    }
    statement
}

/// 组装 `UPDATE ... SET ... [WHERE ...] RETURNING *`
///
/// SET 占位符先编号，WHERE / WHERE IN 接着使用同一个计数器。
/// 没有任何条件时更新整张表。
pub fn build_update_statement(
    table: &str,
    fields: &Row,
    wheres: &[Where],
    where_ins: &[WhereIn],
) -> Statement {
    let mut statement = Statement {
        sql: format!("UPDATE {}", table),
        params: Vec::new(),
    };
    let mut counter = 0;
    statement.push(build_set_fragment(fields, &mut counter));
    push_conditions(&mut statement, wheres, where_ins, &mut counter);
    statement.sql.push_str(" RETURNING *");
    statement
}

/// 组装 `DELETE FROM ... [WHERE ...]`；没有任何条件时删除整张表
pub fn build_delete_statement(table: &str, wheres: &[Where], where_ins: &[WhereIn]) -> Statement {
    let mut statement = Statement {
        sql: format!("DELETE FROM {}", table),
        params: Vec::new(),
    };
    let mut counter = 0;
    push_conditions(&mut statement, wheres, where_ins, &mut counter);
    statement
}

/// 组装 `INSERT INTO ... VALUES (...) RETURNING *`
pub fn build_insert_statement(table: &str, fields: &Row) -> Statement {
    if fields.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table),
            params: Vec::new(),
        };
    }
    let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
    let placeholders: Vec<String> = (0..fields.len()).map(placeholder).collect();
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            columns.join(", "),
            placeholders.join(", ")
        ),
        params: fields.values().cloned().collect(),
    }
}
