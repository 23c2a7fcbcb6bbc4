//! Choosing which TLOs a rollout enables
//!
//! The pool is every live or prelive TLO that has no row for the feature.
//! TLOs whose version already satisfies the feature's minimum come first,
//! each group in random order, and the first `count` are taken. When the
//! pool is larger than `count` the load spreads over random TLOs instead of
//! always landing on the lowest ids.

use crate::features::queries::{tlos_off, StatusScope};
use crate::orm::{feature_types, tlos};
use crate::version::{self, ClientVersion, VersionError};
use rand::seq::SliceRandom;
use rand::Rng;
use sea_orm::{ConnectionTrait, DbErr, PaginatorTrait};

/// Live or prelive TLOs without the feature, ordered by id.
///
/// The whole pool is loaded so the shuffle can run on the injected RNG;
/// memory grows with the number of eligible TLOs, not with `count`.
pub async fn eligible_pool<C>(
    db: &C,
    feature_type: &feature_types::Model,
) -> Result<Vec<tlos::Model>, DbErr>
where
    C: ConnectionTrait,
{
    tlos_off(feature_type.id, StatusScope::PreliveOrLive)
        .all(db)
        .await
}

/// Size of [`eligible_pool`] without loading it.
pub async fn eligible_pool_size<C>(
    db: &C,
    feature_type: &feature_types::Model,
) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    tlos_off(feature_type.id, StatusScope::PreliveOrLive)
        .count(db)
        .await
}

/// Order `pool` with version-satisfying TLOs first, shuffle within each
/// group, and keep at most `count`.
pub fn prioritize<R>(
    pool: Vec<tlos::Model>,
    minimum_client_version: &str,
    count: u64,
    rng: &mut R,
) -> Result<Vec<tlos::Model>, VersionError>
where
    R: Rng + ?Sized,
{
    let minimum: ClientVersion = minimum_client_version.parse()?;

    let mut sufficient = Vec::new();
    let mut insufficient = Vec::new();
    for tlo in pool {
        let reported: ClientVersion = tlo.required_version.parse()?;
        if reported >= minimum {
            sufficient.push(tlo);
        } else {
            insufficient.push(tlo);
        }
    }

    sufficient.shuffle(rng);
    insufficient.shuffle(rng);

    let limit = usize::try_from(count).unwrap_or(usize::MAX);
    Ok(sufficient
        .into_iter()
        .chain(insufficient)
        .take(limit)
        .collect())
}

/// Select up to `count` TLOs to enable the feature for.
pub async fn random_tlos_with_version_priority<C, R>(
    db: &C,
    feature_type: &feature_types::Model,
    count: u64,
    rng: &mut R,
) -> Result<Vec<tlos::Model>, crate::error::FeatureError>
where
    C: ConnectionTrait,
    R: Rng + ?Sized,
{
    let pool = eligible_pool(db, feature_type).await?;
    let selected = prioritize(pool, &feature_type.minimum_client_version, count, rng)?;
    log::debug!(
        "Selected {} tlo(s) for '{}' (requested {}, {} with sufficient version)",
        selected.len(),
        feature_type.name,
        count,
        selected
            .iter()
            .filter(|tlo| {
                version::has_sufficient_version(
                    &tlo.required_version,
                    &feature_type.minimum_client_version,
                )
                .unwrap_or(false)
            })
            .count()
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::tlos::TloStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tlo(id: i32, version: &str) -> tlos::Model {
        let now = chrono::Utc::now().naive_utc();
        tlos::Model {
            id,
            status: TloStatus::Live,
            required_version: version.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(tlos: &[tlos::Model]) -> Vec<i32> {
        tlos.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_sufficient_versions_come_first() {
        let pool = vec![
            tlo(1, "1.0.0"),
            tlo(2, "3.0.0"),
            tlo(3, "2.9.9"),
            tlo(4, "3.2.0"),
            tlo(5, "4.0.0"),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let selected = prioritize(pool, "3.0.0", 5, &mut rng).unwrap();

        let mut head = ids(&selected[..3]);
        head.sort();
        assert_eq!(head, vec![2, 4, 5]);
        let mut tail = ids(&selected[3..]);
        tail.sort();
        assert_eq!(tail, vec![1, 3]);
    }

    #[test]
    fn test_count_truncates_after_priority() {
        let pool = vec![tlo(1, "1.0.0"), tlo(2, "3.0.0"), tlo(3, "3.1.0")];
        let mut rng = StdRng::seed_from_u64(1);
        let mut selected = ids(&prioritize(pool, "3.0.0", 2, &mut rng).unwrap());
        selected.sort();
        assert_eq!(selected, vec![2, 3]);
    }

    #[test]
    fn test_count_larger_than_pool_takes_everything() {
        let pool = vec![tlo(1, "1.0.0"), tlo(2, "3.0.0")];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(prioritize(pool, "3.0.0", 50, &mut rng).unwrap().len(), 2);
    }

    #[test]
    fn test_zero_count_selects_nothing() {
        let pool = vec![tlo(1, "3.0.0")];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(prioritize(pool, "3.0.0", 0, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_same_seed_same_order() {
        let pool: Vec<_> = (1..=20).map(|id| tlo(id, "3.0.0")).collect();
        let first = prioritize(pool.clone(), "3.0.0", 20, &mut StdRng::seed_from_u64(99)).unwrap();
        let second = prioritize(pool, "3.0.0", 20, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_selection_is_not_fixed_to_low_ids() {
        let pool: Vec<_> = (1..=100).map(|id| tlo(id, "3.0.0")).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let selected = ids(&prioritize(pool, "3.0.0", 10, &mut rng).unwrap());
        assert_ne!(selected, (1..=10).collect::<Vec<_>>());
    }
}
