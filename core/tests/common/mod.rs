#![allow(dead_code)]

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlxactive::{
    async_trait, has_many, BoxFuture, Gateway, Model, Record, Relations, Result, Row, Value,
};
use std::collections::VecDeque;

/// 记录每条 `(sql, params)` 并按顺序回放预置结果的网关
#[derive(Default)]
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<Vec<Row>>>>,
    executed: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.responses.lock().push_back(Ok(rows));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(sqlx::Error::Protocol(message.to_string()).into()));
    }

    /// 预置列目录查询的结果
    pub fn push_columns(&self, columns: &[&str]) {
        let rows = columns
            .iter()
            .map(|c| sqlxactive::row! { "column_name" => *c })
            .collect();
        self.push_rows(rows);
    }

    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.executed.lock().clone()
    }

    pub fn last_sql(&self) -> String {
        self.executed
            .lock()
            .last()
            .map(|(sql, _)| sql.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.executed
            .lock()
            .push((sql.to_string(), params.to_vec()));
        self.responses.lock().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[model(table = "users")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn user_articles<'a>(user: &'a User, gateway: &'a dyn Gateway) -> BoxFuture<'a, Result<Value>> {
    Box::pin(has_many::<Article>(gateway, "user_id", Value::from(user.id)))
}

#[async_trait]
impl Record for User {
    async fn factory_defaults(_gateway: &dyn Gateway, _overrides: &Row) -> Result<Row> {
        Ok(sqlxactive::row! {
            "username" => "factory-user",
            "email" => "factory@example.com",
        })
    }

    fn relations() -> Relations<Self> {
        Relations::new().register("articles", user_articles)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[model(table = "articles")]
pub struct Article {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
}

fn article_author<'a>(article: &'a Article, gateway: &'a dyn Gateway) -> BoxFuture<'a, Result<Value>> {
    Box::pin(sqlxactive::belongs_to::<User>(gateway, Value::from(article.user_id)))
}

#[async_trait]
impl Record for Article {
    /// 未指定 user_id 时先创建一个作者
    async fn factory_defaults(gateway: &dyn Gateway, overrides: &Row) -> Result<Row> {
        let user_id = match overrides.get("user_id") {
            Some(id) => id.clone(),
            None => Value::from(User::factory(gateway, Row::new()).await?.id),
        };
        Ok(sqlxactive::row! {
            "user_id" => user_id,
            "title" => "Untitled",
        })
    }

    fn relations() -> Relations<Self> {
        Relations::new().register("author", article_author)
    }
}

pub fn user_row(id: i64, username: &str) -> Row {
    sqlxactive::row! {
        "id" => id,
        "username" => username,
        "email" => Value::Null,
        "created_at" => Value::Null,
        "updated_at" => Value::Null,
    }
}

pub fn article_row(id: i64, user_id: i64, title: &str) -> Row {
    sqlxactive::row! {
        "id" => id,
        "user_id" => user_id,
        "title" => title,
    }
}
