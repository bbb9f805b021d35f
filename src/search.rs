//! Full text index over short documents (movie titles), ranked with BM25.
//!
//! Layout, for an index named `n`:
//! - `n_tokens`: token -> [`TokenStats`]
//! - `n_postings`: token id ++ document id -> occurrences of the token
//! - `n_documents`: document id -> [`IndexedDocument`], plus [`CorpusStats`]
//!   under the empty key

use crate::database::{decode, encode, serialize_id, StoreError};
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree, Transactional,
};
use std::collections::{BTreeMap, HashMap};
use unic_ucd_category::GeneralCategory;

pub fn is_token_character(c: char) -> bool {
    let category = GeneralCategory::of(c);
    category.is_number() || category.is_letter() || category == GeneralCategory::PrivateUse
}

pub fn tokens(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c| !is_token_character(c))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn token_counts(s: &str) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for token in tokens(s) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

const TOKENS_POSTFIX: &[u8] = b"_tokens";
const POSTINGS_POSTFIX: &[u8] = b"_postings";
const DOCUMENTS_POSTFIX: &[u8] = b"_documents";
const CORPUS: &[u8] = &[];

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Serialize, Deserialize, Debug, Default)]
struct TokenStats {
    id: u64,
    documents: u32,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct CorpusStats {
    documents: u32,
    total_len: u64,
}

#[derive(Serialize, Deserialize, Debug)]
struct IndexedDocument {
    len: u32,
    tokens: BTreeMap<String, u32>,
}

pub struct SearchIndex {
    tokens: sled::Tree,
    postings: sled::Tree,
    documents: sled::Tree,
}

pub trait SearchExt {
    fn open_search<V: AsRef<[u8]>>(&self, name: V) -> sled::Result<SearchIndex>;
}

impl SearchExt for sled::Db {
    fn open_search<V: AsRef<[u8]>>(&self, name: V) -> sled::Result<SearchIndex> {
        let open = |postfix: &[u8]| {
            let mut tree_name = name.as_ref().to_vec();
            tree_name.extend_from_slice(postfix);
            self.open_tree(tree_name)
        };
        Ok(SearchIndex {
            tokens: open(TOKENS_POSTFIX)?,
            postings: open(POSTINGS_POSTFIX)?,
            documents: open(DOCUMENTS_POSTFIX)?,
        })
    }
}

fn posting_key(token_id: u64, doc: i64) -> Vec<u8> {
    let mut key = token_id.to_be_bytes().to_vec();
    key.extend_from_slice(&serialize_id(doc));
    key
}

fn abort(err: StoreError) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(err)
}

fn load<T: serde::de::DeserializeOwned + Default>(
    tree: &TransactionalTree,
    key: &[u8],
) -> ConflictableTransactionResult<T, StoreError> {
    match tree.get(key)? {
        Some(bytes) => decode(&bytes).map_err(abort),
        None => Ok(T::default()),
    }
}

fn store<T: Serialize>(
    tree: &TransactionalTree,
    key: &[u8],
    value: &T,
) -> ConflictableTransactionResult<(), StoreError> {
    tree.insert(key, encode(value).map_err(abort)?)?;
    Ok(())
}

/// Removes `doc` from the index if it is there.
fn unindex_in(
    tokens: &TransactionalTree,
    postings: &TransactionalTree,
    documents: &TransactionalTree,
    doc: i64,
) -> ConflictableTransactionResult<(), StoreError> {
    let old: IndexedDocument = match documents.remove(&serialize_id(doc)[..])? {
        Some(bytes) => decode(&bytes).map_err(abort)?,
        None => return Ok(()),
    };
    let mut corpus: CorpusStats = load(documents, CORPUS)?;
    corpus.documents = corpus.documents.saturating_sub(1);
    corpus.total_len = corpus.total_len.saturating_sub(u64::from(old.len));
    store(documents, CORPUS, &corpus)?;
    for token in old.tokens.keys() {
        let mut stats: TokenStats = match tokens.get(token.as_bytes())? {
            Some(bytes) => decode(&bytes).map_err(abort)?,
            None => continue,
        };
        stats.documents = stats.documents.saturating_sub(1);
        store(tokens, token.as_bytes(), &stats)?;
        postings.remove(posting_key(stats.id, doc))?;
    }
    Ok(())
}

fn storage_error(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => e.into(),
    }
}

impl SearchIndex {
    /// Indexes `text` under `doc`, replacing whatever was indexed for it before.
    pub fn index(&self, doc: i64, text: &str) -> Result<(), StoreError> {
        let counts = token_counts(text);
        let document = IndexedDocument {
            len: counts.values().sum(),
            tokens: counts,
        };
        (&self.tokens, &self.postings, &self.documents)
            .transaction(|(tokens, postings, documents)| {
                unindex_in(tokens, postings, documents, doc)?;
                let mut corpus: CorpusStats = load(documents, CORPUS)?;
                corpus.documents += 1;
                corpus.total_len += u64::from(document.len);
                store(documents, CORPUS, &corpus)?;
                store(documents, &serialize_id(doc), &document)?;
                for (token, count) in &document.tokens {
                    let mut stats: TokenStats = match tokens.get(token.as_bytes())? {
                        Some(bytes) => decode(&bytes).map_err(abort)?,
                        None => TokenStats {
                            id: tokens.generate_id()?,
                            documents: 0,
                        },
                    };
                    stats.documents += 1;
                    store(tokens, token.as_bytes(), &stats)?;
                    store(postings, &posting_key(stats.id, doc), count)?;
                }
                Ok(())
            })
            .map_err(storage_error)
    }

    /// Scores every document matching `query`, best first. Each query token
    /// matches any indexed token it is a prefix of.
    pub fn search(&self, query: &str) -> Result<Vec<(i64, f32)>, StoreError> {
        let corpus: CorpusStats = match self.documents.get(CORPUS)? {
            Some(bytes) => decode(&bytes)?,
            None => return Ok(Vec::new()),
        };
        if corpus.documents == 0 {
            return Ok(Vec::new());
        }
        let num_documents = corpus.documents as f32;
        let avgdl = corpus.total_len as f32 / num_documents;

        let mut scores: HashMap<i64, f32> = HashMap::new();
        for (query_token, query_count) in token_counts(query) {
            for entry in self.tokens.scan_prefix(query_token.as_bytes()) {
                let (_token, stats) = entry?;
                let stats: TokenStats = decode(&stats)?;
                if stats.documents == 0 {
                    continue;
                }
                let df = stats.documents as f32;
                let idf = ((num_documents - df + 0.5) / (df + 0.5) + 1.0).ln();
                for posting in self.postings.scan_prefix(stats.id.to_be_bytes()) {
                    let (key, frequency) = posting?;
                    let doc = doc_from_posting(&key)?;
                    let frequency = decode::<u32>(&frequency)? as f32;
                    let dl = match self.documents.get(serialize_id(doc))? {
                        Some(bytes) => decode::<IndexedDocument>(&bytes)?.len as f32,
                        None => continue,
                    };
                    let bm25 = idf * frequency * (K1 + 1.0)
                        / (frequency + K1 * (1.0 - B + B * dl / avgdl));
                    *scores.entry(doc).or_insert(0.0) += bm25 * query_count as f32;
                }
            }
        }

        let mut ranked = scores.into_iter().collect::<Vec<_>>();
        ranked.sort_by(|(a_doc, a), (b_doc, b)| {
            b.partial_cmp(a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a_doc.cmp(b_doc))
        });
        Ok(ranked)
    }
}

fn doc_from_posting(key: &[u8]) -> Result<i64, StoreError> {
    use std::convert::TryInto;
    key.get(8..16)
        .and_then(|bytes| bytes.try_into().ok())
        .map(i64::from_be_bytes)
        .ok_or_else(|| StoreError::Invalid("truncated posting key".to_owned()))
}
