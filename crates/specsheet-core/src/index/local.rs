use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tantivy::{
    collector::TopDocs,
    query::QueryParser,
    schema::{Field, Schema, Value, STORED, STRING, TEXT},
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};

use super::{IndexObject, SearchIndex};
use crate::error::{Result, SpecsheetError};
use crate::types::RecordId;

struct Fields {
    id: Field,
    uid: Field,
    idea: Field,
    spec: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let id = builder.add_text_field("id", STRING | STORED);
    let uid = builder.add_text_field("uid", STRING);
    let idea = builder.add_text_field("idea", TEXT);
    let spec = builder.add_text_field("spec", TEXT);
    (builder.build(), Fields { id, uid, idea, spec })
}

fn search_err(e: impl std::fmt::Display) -> SpecsheetError {
    SpecsheetError::Search(e.to_string())
}

/// In-RAM tantivy index standing in for the hosted index during
/// development. Contents are lost on restart.
///
/// Default search fields are the idea and the spec text; `uid:<id>` scopes
/// to one owner. Bare terms are ANDed. Commits and searches run on the
/// blocking pool.
pub struct LocalIndex {
    inner: Arc<Inner>,
}

struct Inner {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

impl Inner {
    fn write(&self, f: impl FnOnce(&mut IndexWriter, &Fields) -> Result<()>) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SpecsheetError::Search("index writer lock poisoned".into()))?;
        f(&mut writer, &self.fields)?;
        writer.commit().map_err(search_err)?;
        self.reader.reload().map_err(search_err)?;
        Ok(())
    }

    fn search(&self, query: &str, hits_per_page: usize) -> Result<Vec<RecordId>> {
        let searcher = self.reader.searcher();
        let mut parser =
            QueryParser::for_index(&self.index, vec![self.fields.idea, self.fields.spec]);
        parser.set_conjunction_by_default();

        let query = match parser.parse_query(query) {
            Ok(q) => q,
            Err(_) => return Ok(vec![]),
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(hits_per_page.max(1)))
            .map_err(search_err)?;

        let mut ids = Vec::with_capacity(top_docs.len());
        for (_score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr).map_err(search_err)?;
            if let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_str()) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}

impl LocalIndex {
    pub fn new() -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        // 15 MB heap is plenty for a development corpus
        let writer: IndexWriter = index.writer(15_000_000).map_err(search_err)?;
        // Manual reload after every commit so reads see writes immediately
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(search_err)?;
        Ok(Self {
            inner: Arc::new(Inner {
                index,
                reader,
                writer: Mutex::new(writer),
                fields,
            }),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(search_err)?
    }
}

#[async_trait]
impl SearchIndex for LocalIndex {
    async fn save_object(&self, object: &IndexObject) -> Result<()> {
        let object = object.clone();
        self.blocking(move |inner| {
            inner.write(|w, f| {
                w.delete_term(Term::from_field_text(f.id, &object.object_id));
                let mut doc = TantivyDocument::default();
                doc.add_text(f.id, &object.object_id);
                doc.add_text(f.uid, &object.uid);
                doc.add_text(f.idea, &object.product_idea);
                doc.add_text(f.spec, &object.spec);
                w.add_document(doc).map_err(search_err)?;
                Ok(())
            })
        })
        .await
    }

    async fn delete_object(&self, object_id: &str) -> Result<()> {
        let object_id = object_id.to_string();
        self.blocking(move |inner| {
            inner.write(|w, f| {
                w.delete_term(Term::from_field_text(f.id, &object_id));
                Ok(())
            })
        })
        .await
    }

    async fn search(&self, query: &str, hits_per_page: usize) -> Result<Vec<RecordId>> {
        let query = query.to_string();
        self.blocking(move |inner| inner.search(&query, hits_per_page)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(id: &str, uid: &str, idea: &str, spec: &str) -> IndexObject {
        IndexObject {
            object_id: id.into(),
            uid: uid.into(),
            product_idea: idea.into(),
            spec: spec.into(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn finds_by_idea_and_spec_text() {
        let idx = LocalIndex::new().unwrap();
        idx.save_object(&obj("a", "u1", "todo list", "# Tasks with deadlines"))
            .await
            .unwrap();
        idx.save_object(&obj("b", "u2", "chat bot", "# Conversational agent"))
            .await
            .unwrap();

        assert_eq!(idx.search("todo", 20).await.unwrap(), vec!["a"]);
        assert_eq!(idx.search("conversational", 20).await.unwrap(), vec!["b"]);
        assert!(idx.search("spaceship", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_replaces_existing_object() {
        let idx = LocalIndex::new().unwrap();
        idx.save_object(&obj("a", "u1", "todo", "old")).await.unwrap();
        idx.save_object(&obj("a", "u1", "todo", "fresh")).await.unwrap();
        assert_eq!(idx.search("todo", 20).await.unwrap(), vec!["a"]);
        assert!(idx.search("old", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_from_results() {
        let idx = LocalIndex::new().unwrap();
        idx.save_object(&obj("a", "u1", "todo", "x")).await.unwrap();
        idx.delete_object("a").await.unwrap();
        assert!(idx.search("todo", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_scope_query() {
        let idx = LocalIndex::new().unwrap();
        idx.save_object(&obj("a", "u1", "todo", "x")).await.unwrap();
        idx.save_object(&obj("b", "u2", "todo", "x")).await.unwrap();
        assert_eq!(idx.search("todo AND uid:u2", 20).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn respects_hit_limit() {
        let idx = LocalIndex::new().unwrap();
        for i in 0..5 {
            idx.save_object(&obj(&format!("r{i}"), "u1", "todo", "x"))
                .await
                .unwrap();
        }
        assert_eq!(idx.search("todo", 3).await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writers_from_spawned_tasks() {
        let idx = Arc::new(LocalIndex::new().unwrap());
        let mut handles = Vec::new();
        for i in 0..8 {
            let idx = Arc::clone(&idx);
            handles.push(tokio::spawn(async move {
                idx.save_object(&obj(&format!("r{i}"), "u1", "parallel", "x"))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(idx.search("parallel", 20).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn malformed_query_yields_nothing() {
        let idx = LocalIndex::new().unwrap();
        idx.save_object(&obj("a", "u1", "todo", "x")).await.unwrap();
        assert!(idx.search("idea:(", 20).await.unwrap().is_empty());
    }
}
