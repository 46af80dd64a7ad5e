use super::types::{DocumentId, DocumentPayload};
use crate::config::CorpusConfig;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const VOCABULARY: &[&str] = &[
    "market", "shares", "government", "minister", "election", "football", "season", "league",
    "weather", "storm", "research", "university", "hospital", "patients", "company", "profits",
    "police", "investigation", "council", "housing", "energy", "prices", "climate", "summit",
    "festival", "music", "airport", "flights", "railway", "strike", "budget", "taxes", "court",
    "verdict", "science", "space", "launch", "technology", "software", "security",
];

/// Sentences shared between doctypes so the corpus has overlapping content.
const SHARED_PASSAGES: &[&str] = &[
    "The central bank held interest rates steady for the third month running",
    "Thousands of commuters faced delays after signal failures across the network",
    "Researchers published findings suggesting the treatment reduced recovery times",
    "The championship final was postponed because of heavy rain and flooding",
    "Officials confirmed the new budget would increase spending on public services",
];

/// Generates a reproducible synthetic corpus: doctypes `1..=doctypes`, docids
/// `1..=documents_per_doctype` in each.
pub fn generate(config: &CorpusConfig, seed: u64) -> Vec<(DocumentId, DocumentPayload)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut documents = Vec::new();

    for doctype in 1..=config.doctypes {
        for docid in 1..=config.documents_per_doctype {
            let mut words: Vec<&str> = (0..config.words_per_document)
                .filter_map(|_| VOCABULARY.choose(&mut rng).copied())
                .collect();

            // Roughly half the documents quote a shared passage.
            if rng.gen_bool(0.5)
                && let Some(passage) = SHARED_PASSAGES.choose(&mut rng)
            {
                let at = rng.gen_range(0..=words.len());
                words.insert(at, passage);
            }

            let title = format!("Synthetic document {}/{}", doctype, docid);
            documents.push((
                DocumentId::new(doctype, docid),
                DocumentPayload::new(title, words.join(" ")),
            ));
        }
    }

    documents
}

/// Applies `doctypes=` and `documents=` overrides from a TestCorpus payload.
pub fn config_from_payload(base: &CorpusConfig, payload: &[u8]) -> CorpusConfig {
    let mut config = *base;
    let params: HashMap<String, String> = serde_urlencoded::from_bytes(payload).unwrap_or_default();

    if let Some(doctypes) = params.get("doctypes").and_then(|v| v.parse().ok()) {
        config.doctypes = doctypes;
    }
    if let Some(documents) = params.get("documents").and_then(|v| v.parse().ok()) {
        config.documents_per_doctype = documents;
    }
    config
}
