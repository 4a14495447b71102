use log::{debug, error, info, warn};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};
use std::path::Path;
use std::time::Instant;

use crate::libcquizy::question::{NewQuestion, Question, QuestionPatch};

const COLUMNS: &str = "id, question, answer, category, context, questionNumber";

impl Question {
    pub fn insert(connection: &Connection, new: NewQuestion) -> Result<Question> {
        match connection.execute(
            "INSERT INTO \
            Question(question, answer, category, context, questionNumber) \
            VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.question,
                new.answer,
                new.category,
                new.context,
                new.question_number
            ],
        ) {
            Ok(_) => {
                let id = connection.last_insert_rowid();
                debug!("[DB] Created new Question {} in Category '{}'", id, new.category);
                Ok(Question::from_new(id, new))
            }
            Err(err) => {
                error!("[DB] Error while creating new Question: {:?}", err);
                Err(err)
            }
        }
    }

    fn from_row(row: &Row) -> Result<Question> {
        Ok(Question {
            id: row.get(0)?,
            question: row.get(1)?,
            answer: row.get(2)?,
            category: row.get(3)?,
            context: row.get(4)?,
            question_number: row.get(5)?,
        })
    }

    pub fn get_all(connection: &Connection) -> Result<Vec<Question>> {
        let mut statement = connection.prepare(&format!(
            "SELECT {COLUMNS} FROM Question ORDER BY questionNumber, id"
        ))?;
        let rows = statement.query_map([], |row| Self::from_row(row))?;

        rows.collect()
    }

    pub fn get_in_category(connection: &Connection, category: &str) -> Result<Vec<Question>> {
        let mut statement = connection.prepare(&format!(
            "SELECT {COLUMNS} FROM Question WHERE category = :category ORDER BY questionNumber, id"
        ))?;
        let rows = statement.query_map(&[(":category", &category)], |row| Self::from_row(row))?;

        rows.collect()
    }

    pub fn get_by_id(connection: &Connection, id: i64) -> Result<Option<Question>> {
        let mut statement =
            connection.prepare(&format!("SELECT {COLUMNS} FROM Question WHERE id = :id LIMIT 1"))?;
        statement
            .query_row(&[(":id", &id)], |row| Self::from_row(row))
            .optional()
    }

    /// Applies `patch` to an existing row. Returns `None` without touching the
    /// table when `id` is unknown.
    pub fn update(connection: &Connection, id: i64, patch: QuestionPatch) -> Result<Option<Question>> {
        let tx = connection.unchecked_transaction()?;
        let Some(mut question) = Self::get_by_id(&tx, id)? else {
            debug!("[DB] Question {} not found for update", id);
            return Ok(None);
        };
        question.apply(patch);

        match tx.execute(
            "UPDATE Question SET question = ?2, answer = ?3, category = ?4, context = ?5, \
            questionNumber = ?6 WHERE id = ?1",
            params![
                id,
                question.question,
                question.answer,
                question.category,
                question.context,
                question.question_number
            ],
        ) {
            Ok(_) => {
                tx.commit()?;
                debug!("[DB] Updated Question {}", id);
                Ok(Some(question))
            }
            Err(err) => {
                error!("[DB] Failed to update Question {}: {:?}", id, err);
                Err(err)
            }
        }
    }

    /// Returns whether a row was removed.
    pub fn delete(connection: &Connection, id: i64) -> Result<bool> {
        match connection.execute("DELETE FROM Question WHERE id = ?1", params![id]) {
            Ok(removed) => {
                debug!("[DB] Deleted Question {} ({} rows)", id, removed);
                Ok(removed > 0)
            }
            Err(err) => {
                error!("[DB] Error while deleting Question {}: {:?}", id, err);
                Err(err)
            }
        }
    }

    pub fn delete_all(connection: &Connection) -> Result<usize> {
        let removed = connection.execute("DELETE FROM Question", [])?;
        info!("[DB] Cleared {} Questions", removed);
        Ok(removed)
    }

    pub fn count(connection: &Connection) -> Result<i64> {
        connection.query_row("SELECT COUNT(*) FROM Question", [], |row| row.get(0))
    }
}

pub fn create_or_open(src: &Path) -> Result<Connection> {
    if src.exists() {
        info!("[DB] Opening existing Database");
        open_db(src)
    } else {
        info!("[DB] Creating new Database");
        create_db(src)
    }
}

pub fn create_db(dest: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = init_db(Connection::open_in_memory()?)?;
    match db.backup(DatabaseName::Main, dest, None) {
        Ok(_) => {
            close_db(db)?;
            debug!(
                "[DB] Creating and Saving took {} ms.",
                now.elapsed().as_millis()
            );
            open_db(dest)
        }
        Err(err) => {
            warn!("[DB] Failed to create database file: {}", err);
            close_db(db)?;
            Err(err)
        }
    }
}

pub fn open_db(src: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = init_db(Connection::open(src)?)?;
    debug!("[DB] Opening took {} ms.", now.elapsed().as_millis());
    Ok(db)
}

pub fn open_in_memory() -> Result<Connection> {
    init_db(Connection::open_in_memory()?)
}

pub fn close_db(connection: Connection) -> Result<()> {
    info!("[DB] Closing Database");
    let mut connection = connection;
    for attempt in 1..=2 {
        match connection.close() {
            Ok(_) => return Ok(()),
            Err((conn, err)) => {
                error!("[DB] Cannot close connection ({}). Retrying {}/2...", err, attempt);
                connection = conn;
            }
        }
    }
    connection.close().map_err(|(_, err)| {
        error!("[DB] Cannot close connection! Giving up.");
        err
    })
}

fn init_db(conn: Connection) -> Result<Connection> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS Question (
              id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
              question TEXT NOT NULL,
              answer TEXT NOT NULL,
              category TEXT NOT NULL,
              context TEXT NOT NULL,
              questionNumber REAL NOT NULL
            )",
        (),
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS Question_category_idx ON Question(category)",
        (),
    )?;
    debug!("[DB INIT] Schema ready");

    Ok(conn)
}
