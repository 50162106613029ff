//! Sample elections for local development.

use crate::error::Result;
use crate::model::{
    api::election::{CandidateSpec, ElectionSpec},
    common::election::{ElectionKind, ElectionStatus},
    mongodb::Id,
};

use super::Store;

/// `(title, description, kind, category, icon, [(name, party, image, color)])`
type Sample = (
    &'static str,
    &'static str,
    ElectionKind,
    &'static str,
    &'static str,
    &'static [(&'static str, &'static str, &'static str, &'static str)],
);

const SAMPLES: &[Sample] = &[
    (
        "Ward Commissioner, Ward 12",
        "Pick the commissioner for the coming term",
        ElectionKind::Election,
        "Local",
        "🏙️",
        &[
            ("Nasrin Akter", "Independent", "👩", "#1f77b4"),
            ("Kamal Hossain", "Citizens' Alliance", "👨", "#2ca02c"),
            ("Farhana Islam", "Green Bengal", "🌿", "#d62728"),
        ],
    ),
    (
        "University Senate Representative",
        "Students choose one senate representative",
        ElectionKind::Election,
        "Education",
        "🎓",
        &[
            ("Tanvir Ahmed", "Students First", "📘", "#9467bd"),
            ("Sadia Rahman", "Open Campus", "📗", "#ff7f0e"),
        ],
    ),
    (
        "Favourite Street Food",
        "Just for fun: what should the fair serve first?",
        ElectionKind::Poll,
        "Entertainment",
        "🍢",
        &[
            ("Fuchka", "Savoury", "🥟", "#e377c2"),
            ("Jhalmuri", "Savoury", "🥜", "#8c564b"),
            ("Pitha", "Sweet", "🍘", "#17becf"),
            ("Chotpoti", "Savoury", "🍲", "#bcbd22"),
        ],
    ),
];

/// Insert the sample elections, all open for voting, unless the store
/// already has elections of any status. Returns how many were inserted.
pub async fn seed_sample_elections(store: &Store, created_by: Id) -> Result<usize> {
    for status in [
        ElectionStatus::Upcoming,
        ElectionStatus::Active,
        ElectionStatus::Closed,
    ] {
        if !store.elections_with_status(status).await?.is_empty() {
            debug!("Elections already exist, not seeding");
            return Ok(0);
        }
    }

    for (title, description, kind, category, icon, candidates) in SAMPLES {
        let spec = ElectionSpec {
            title: title.to_string(),
            description: description.to_string(),
            kind: *kind,
            category: category.to_string(),
            icon: Some(icon.to_string()),
            status: Some(ElectionStatus::Active),
            start_date: None,
            end_date: None,
            candidates: candidates
                .iter()
                .map(|(name, party, image, color)| CandidateSpec {
                    name: name.to_string(),
                    party: party.to_string(),
                    image: Some(image.to_string()),
                    color: Some(color.to_string()),
                })
                .collect(),
        };
        let election = store.insert_election(spec.into_election(created_by)?).await?;
        debug!("Seeded election {} ({})", election.id, election.title);
    }
    Ok(SAMPLES.len())
}
