//! `PostgresKnowledgeRepository`, grounded on
//! `original_source/core/database/repositories/knowledge_repository.py`.
//! SQL shapes mirror the original almost verbatim, including the
//! `array_agg`/`json_agg(...) FILTER (WHERE ... IS NOT NULL)` pattern for
//! pulling a point's children in the single `find_by_id` round trip.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Row};

use kp_model::{EditableSnapshot, KnowledgePoint, OriginalError, ReviewExample, VersionHistoryEntry};
use kp_taxonomy::category::ErrorCategory;

use crate::error::{classify, StoreError};
use crate::filters::KnowledgePointFilter;
use crate::repository::{RepoStatistics, Repository};

pub struct PostgresKnowledgeRepository {
    pool: PgPool,
}

impl PostgresKnowledgeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Deserialize)]
struct ReviewExampleRow {
    chinese_sentence: String,
    user_answer: String,
    correct_answer: String,
    is_correct: bool,
    timestamp: DateTime<Utc>,
}

impl From<ReviewExampleRow> for ReviewExample {
    fn from(row: ReviewExampleRow) -> Self {
        ReviewExample {
            chinese_sentence: row.chinese_sentence,
            user_answer: row.user_answer,
            correct_answer: row.correct_answer,
            is_correct: row.is_correct,
            timestamp: row.timestamp,
        }
    }
}

fn row_to_version_entry(row: sqlx::postgres::PgRow) -> Result<VersionHistoryEntry, StoreError> {
    let before: EditableSnapshot = serde_json::from_value(row.try_get("before_snapshot")?).map_err(|e| {
        StoreError::Generic(sqlx::Error::Decode(Box::new(e)))
    })?;
    let after: EditableSnapshot = serde_json::from_value(row.try_get("after_snapshot")?).map_err(|e| {
        StoreError::Generic(sqlx::Error::Decode(Box::new(e)))
    })?;
    let changed_fields: Vec<String> = serde_json::from_value(row.try_get("changed_fields")?).map_err(|e| {
        StoreError::Generic(sqlx::Error::Decode(Box::new(e)))
    })?;
    Ok(VersionHistoryEntry {
        timestamp: row.try_get("timestamp")?,
        before,
        after,
        changed_fields,
    })
}

const FLAT_COLUMNS: &str = "id, key_point, category, subtype, explanation, original_phrase, correction, \
     mastery_level, mistake_count, correct_count, created_at, last_seen, \
     next_review, is_deleted, deleted_at, deleted_reason, custom_notes, last_modified";

fn row_to_flat_point(row: &sqlx::postgres::PgRow) -> Result<KnowledgePoint, StoreError> {
    let category_str: String = row.try_get("category")?;
    Ok(KnowledgePoint {
        id: row.try_get("id")?,
        key_point: row.try_get("key_point")?,
        original_phrase: row.try_get("original_phrase")?,
        correction: row.try_get("correction")?,
        explanation: row.try_get("explanation")?,
        category: ErrorCategory::parse_or_other(&category_str),
        subtype: row.try_get("subtype")?,
        tags: BTreeSet::new(),
        custom_notes: row.try_get("custom_notes")?,
        mastery_level: row.try_get("mastery_level")?,
        mistake_count: row.try_get::<i32, _>("mistake_count")? as u32,
        correct_count: row.try_get::<i32, _>("correct_count")? as u32,
        next_review: row.try_get("next_review")?,
        last_seen: row.try_get("last_seen")?,
        original_error: OriginalError {
            chinese_sentence: String::new(),
            user_answer: String::new(),
            correct_answer: String::new(),
            timestamp: row.try_get("created_at")?,
        },
        review_examples: Vec::new(),
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
        is_deleted: row.try_get("is_deleted")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_reason: row.try_get("deleted_reason")?,
        version_history: Vec::new(),
    })
}

#[async_trait]
impl Repository for PostgresKnowledgeRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<KnowledgePoint>, StoreError> {
        let query = r#"
            SELECT
                kp.*,
                oe.chinese_sentence as oe_chinese,
                oe.user_answer as oe_user_answer,
                oe.correct_answer as oe_correct_answer,
                oe.timestamp as oe_timestamp,
                COALESCE(
                    json_agg(
                        json_build_object(
                            'chinese_sentence', re.chinese_sentence,
                            'user_answer', re.user_answer,
                            'correct_answer', re.correct_answer,
                            'timestamp', re.timestamp,
                            'is_correct', re.is_correct
                        ) ORDER BY re.timestamp DESC
                    ) FILTER (WHERE re.id IS NOT NULL),
                    '[]'
                ) as review_examples,
                COALESCE(array_agg(DISTINCT t.name) FILTER (WHERE t.id IS NOT NULL), ARRAY[]::text[]) as tags
            FROM knowledge_points kp
            LEFT JOIN original_errors oe ON kp.id = oe.knowledge_point_id
            LEFT JOIN review_examples re ON kp.id = re.knowledge_point_id
            LEFT JOIN knowledge_point_tags kpt ON kp.id = kpt.knowledge_point_id
            LEFT JOIN tags t ON kpt.tag_id = t.id
            WHERE kp.id = $1
            GROUP BY kp.id, oe.chinese_sentence, oe.user_answer, oe.correct_answer, oe.timestamp
        "#;

        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        let Some(row) = row else { return Ok(None) };

        let mut point = row_to_flat_point(&row)?;

        point.original_error = OriginalError {
            chinese_sentence: row.try_get::<Option<String>, _>("oe_chinese")?.unwrap_or_default(),
            user_answer: row.try_get::<Option<String>, _>("oe_user_answer")?.unwrap_or_default(),
            correct_answer: row.try_get::<Option<String>, _>("oe_correct_answer")?.unwrap_or_default(),
            timestamp: row
                .try_get::<Option<DateTime<Utc>>, _>("oe_timestamp")?
                .unwrap_or(point.created_at),
        };

        let review_examples_json: serde_json::Value = row.try_get("review_examples")?;
        let review_rows: Vec<ReviewExampleRow> = serde_json::from_value(review_examples_json).unwrap_or_default();
        point.review_examples = review_rows.into_iter().map(ReviewExample::from).collect();

        let tags: Vec<String> = row.try_get("tags")?;
        point.tags = tags.into_iter().collect();

        let version_rows = sqlx::query(
            "SELECT timestamp, before_snapshot, after_snapshot, changed_fields \
             FROM knowledge_point_versions WHERE knowledge_point_id = $1 ORDER BY timestamp ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        point.version_history = version_rows.into_iter().map(row_to_version_entry).collect::<Result<Vec<_>, _>>()?;

        Ok(Some(point))
    }

    async fn find_all(&self, filters: &KnowledgePointFilter) -> Result<Vec<KnowledgePoint>, StoreError> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new(format!("SELECT {FLAT_COLUMNS} FROM knowledge_points"));
        let mut has_where = false;

        if let Some(is_deleted) = filters.is_deleted {
            builder.push(if has_where { " AND " } else { " WHERE " });
            has_where = true;
            builder.push("is_deleted = ").push_bind(is_deleted);
        }
        if let Some(category) = filters.category {
            builder.push(if has_where { " AND " } else { " WHERE " });
            has_where = true;
            builder.push("category = ").push_bind(category.to_string());
        }
        if let Some(subtype) = &filters.subtype {
            builder.push(if has_where { " AND " } else { " WHERE " });
            has_where = true;
            builder.push("subtype = ").push_bind(subtype.clone());
        }
        if let Some(min) = filters.mastery_min {
            builder.push(if has_where { " AND " } else { " WHERE " });
            has_where = true;
            builder.push("mastery_level >= ").push_bind(min);
        }
        if let Some(max) = filters.mastery_max {
            builder.push(if has_where { " AND " } else { " WHERE " });
            has_where = true;
            builder.push("mastery_level <= ").push_bind(max);
        }

        builder.push(" ORDER BY last_seen DESC");

        let rows = builder.build().fetch_all(&self.pool).await.map_err(classify)?;
        rows.iter().map(row_to_flat_point).collect()
    }

    async fn create(&self, mut entity: KnowledgePoint) -> Result<KnowledgePoint, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let kp_query = r#"
            INSERT INTO knowledge_points
            (key_point, category, subtype, explanation, original_phrase, correction,
             mastery_level, mistake_count, correct_count, created_at, last_seen,
             next_review, custom_notes, last_modified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
        "#;

        let row = sqlx::query(kp_query)
            .bind(&entity.key_point)
            .bind(entity.category.to_string())
            .bind(&entity.subtype)
            .bind(&entity.explanation)
            .bind(&entity.original_phrase)
            .bind(&entity.correction)
            .bind(entity.mastery_level)
            .bind(entity.mistake_count as i32)
            .bind(entity.correct_count as i32)
            .bind(entity.created_at)
            .bind(entity.last_seen)
            .bind(entity.next_review)
            .bind(&entity.custom_notes)
            .bind(entity.last_modified)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;

        entity.id = row.try_get("id").map_err(classify)?;

        sqlx::query(
            r#"INSERT INTO original_errors
               (knowledge_point_id, chinese_sentence, user_answer, correct_answer, timestamp)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(entity.id)
        .bind(&entity.original_error.chinese_sentence)
        .bind(&entity.original_error.user_answer)
        .bind(&entity.original_error.correct_answer)
        .bind(entity.original_error.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        for example in &entity.review_examples {
            sqlx::query(
                r#"INSERT INTO review_examples
                   (knowledge_point_id, chinese_sentence, user_answer, correct_answer, is_correct, timestamp)
                   VALUES ($1, $2, $3, $4, $5, $6)"#,
            )
            .bind(entity.id)
            .bind(&example.chinese_sentence)
            .bind(&example.user_answer)
            .bind(&example.correct_answer)
            .bind(example.is_correct)
            .bind(example.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        for tag_name in &entity.tags {
            let tag_row = sqlx::query(
                r#"INSERT INTO tags (name) VALUES ($1)
                   ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                   RETURNING id"#,
            )
            .bind(tag_name)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;
            let tag_id: i64 = tag_row.try_get("id").map_err(classify)?;

            sqlx::query(
                r#"INSERT INTO knowledge_point_tags (knowledge_point_id, tag_id)
                   VALUES ($1, $2) ON CONFLICT DO NOTHING"#,
            )
            .bind(entity.id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;
        Ok(entity)
    }

    async fn update(&self, entity: &KnowledgePoint) -> Result<(), StoreError> {
        let query = r#"
            UPDATE knowledge_points SET
                key_point = $2,
                category = $3,
                subtype = $4,
                explanation = $5,
                original_phrase = $6,
                correction = $7,
                mastery_level = $8,
                mistake_count = $9,
                correct_count = $10,
                last_seen = $11,
                next_review = $12,
                custom_notes = $13,
                last_modified = now()
            WHERE id = $1 AND is_deleted = FALSE
            RETURNING last_modified
        "#;

        let result = sqlx::query(query)
            .bind(entity.id)
            .bind(&entity.key_point)
            .bind(entity.category.to_string())
            .bind(&entity.subtype)
            .bind(&entity.explanation)
            .bind(&entity.original_phrase)
            .bind(&entity.correction)
            .bind(entity.mastery_level)
            .bind(entity.mistake_count as i32)
            .bind(entity.correct_count as i32)
            .bind(entity.last_seen)
            .bind(entity.next_review)
            .bind(&entity.custom_notes)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        match result {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!("knowledge point {} not found or deleted", entity.id))),
        }
    }

    async fn delete(&self, id: i64, reason: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"UPDATE knowledge_points
               SET is_deleted = TRUE, deleted_at = now(), deleted_reason = $2
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING id"#,
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.is_some())
    }

    async fn restore(&self, id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"UPDATE knowledge_points
               SET is_deleted = FALSE, deleted_at = NULL, deleted_reason = NULL
               WHERE id = $1 AND is_deleted = TRUE
               RETURNING id"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.is_some())
    }

    async fn find_due_for_review(&self, limit: i64) -> Result<Vec<KnowledgePoint>, StoreError> {
        let query = format!(
            r#"SELECT {FLAT_COLUMNS} FROM knowledge_points
               WHERE next_review <= now()
                 AND is_deleted = FALSE
                 AND mastery_level < 0.9
                 AND category IN ('isolated', 'enhancement')
               ORDER BY next_review ASC, mastery_level ASC
               LIMIT $1"#
        );
        let rows = sqlx::query(&query).bind(limit).fetch_all(&self.pool).await.map_err(classify)?;
        rows.iter().map(row_to_flat_point).collect()
    }

    async fn find_by_category(
        &self,
        category: ErrorCategory,
        subtype: Option<&str>,
    ) -> Result<Vec<KnowledgePoint>, StoreError> {
        let rows = if let Some(subtype) = subtype {
            let query = format!(
                "SELECT {FLAT_COLUMNS} FROM knowledge_points \
                 WHERE category = $1 AND subtype = $2 AND is_deleted = FALSE ORDER BY created_at DESC"
            );
            sqlx::query(&query)
                .bind(category.to_string())
                .bind(subtype)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?
        } else {
            let query = format!(
                "SELECT {FLAT_COLUMNS} FROM knowledge_points \
                 WHERE category = $1 AND is_deleted = FALSE ORDER BY created_at DESC"
            );
            sqlx::query(&query).bind(category.to_string()).fetch_all(&self.pool).await.map_err(classify)?
        };
        rows.iter().map(row_to_flat_point).collect()
    }

    async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<KnowledgePoint>, StoreError> {
        let query = format!(
            r#"SELECT {FLAT_COLUMNS} FROM knowledge_points
               WHERE (
                   key_point ILIKE $1
                   OR explanation ILIKE $1
                   OR original_phrase ILIKE $1
                   OR correction ILIKE $1
               ) AND is_deleted = FALSE
               ORDER BY
                   CASE
                       WHEN key_point ILIKE $1 THEN 1
                       WHEN original_phrase ILIKE $1 THEN 2
                       WHEN correction ILIKE $1 THEN 3
                       ELSE 4
                   END,
                   created_at DESC
               LIMIT $2"#
        );
        let pattern = format!("%{keyword}%");
        let rows = sqlx::query(&query).bind(pattern).bind(limit).fetch_all(&self.pool).await.map_err(classify)?;
        rows.iter().map(row_to_flat_point).collect()
    }

    async fn add_review_example(&self, knowledge_point_id: i64, example: &ReviewExample) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"INSERT INTO review_examples
               (knowledge_point_id, chinese_sentence, user_answer, correct_answer, is_correct, timestamp)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id"#,
        )
        .bind(knowledge_point_id)
        .bind(&example.chinese_sentence)
        .bind(&example.user_answer)
        .bind(&example.correct_answer)
        .bind(example.is_correct)
        .bind(example.timestamp)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.is_some())
    }

    async fn append_version_history(&self, knowledge_point_id: i64, entry: &VersionHistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO knowledge_point_versions
               (knowledge_point_id, timestamp, before_snapshot, after_snapshot, changed_fields)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(knowledge_point_id)
        .bind(entry.timestamp)
        .bind(serde_json::to_value(&entry.before).expect("EditableSnapshot always serializes"))
        .bind(serde_json::to_value(&entry.after).expect("EditableSnapshot always serializes"))
        .bind(serde_json::to_value(&entry.changed_fields).expect("Vec<String> always serializes"))
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn statistics(&self) -> Result<RepoStatistics, StoreError> {
        let knowledge_row = sqlx::query(
            r#"SELECT
                   COUNT(*) FILTER (WHERE is_deleted = FALSE) as knowledge_points,
                   COUNT(*) FILTER (WHERE mastery_level >= 0.8 AND is_deleted = FALSE) as mastered,
                   COUNT(*) FILTER (WHERE mastery_level < 0.3 AND is_deleted = FALSE) as struggling,
                   COUNT(*) FILTER (WHERE next_review <= now() AND is_deleted = FALSE) as due_reviews,
                   CAST(AVG(mastery_level) FILTER (WHERE is_deleted = FALSE) AS DOUBLE PRECISION) as avg_mastery,
                   COUNT(DISTINCT category) FILTER (WHERE is_deleted = FALSE) as categories_count
               FROM knowledge_points"#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        // A missing review_examples table degrades to zero practices rather
        // than failing the whole statistics call (absorbed by the fallback
        // chain upstream too, but cheap to handle here directly).
        let practice_row = sqlx::query(
            r#"SELECT
                   COUNT(*) as total_practices,
                   COUNT(*) FILTER (WHERE is_correct = TRUE) as correct_count
               FROM review_examples"#,
        )
        .fetch_one(&self.pool)
        .await;

        let (total_practices, correct_count) = match practice_row {
            Ok(row) => (row.try_get::<i64, _>("total_practices").map_err(classify)?, row.try_get::<i64, _>("correct_count").map_err(classify)?),
            Err(_) => (0, 0),
        };

        Ok(RepoStatistics {
            knowledge_points: knowledge_row.try_get("knowledge_points").map_err(classify)?,
            total_practices,
            correct_count,
            due_reviews: knowledge_row.try_get("due_reviews").map_err(classify)?,
            mastered: knowledge_row.try_get("mastered").map_err(classify)?,
            struggling: knowledge_row.try_get("struggling").map_err(classify)?,
            avg_mastery: knowledge_row.try_get::<Option<f64>, _>("avg_mastery").map_err(classify)?.unwrap_or(0.0),
            categories_count: knowledge_row.try_get("categories_count").map_err(classify)?,
        })
    }

    async fn purge(&self, ids: &[i64]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM knowledge_points WHERE id = ANY($1) AND is_deleted = TRUE")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(result.rows_affected())
    }
}
