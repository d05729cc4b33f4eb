//! Random station assignment for existing users.

use std::ops::RangeInclusive;

use monitoring::models::{Location, Station, UserAccount};
use monitoring::{AppError, RecordStore};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// Gives every user a random number of stations (drawn from `per_user`), each at a
/// uniformly chosen location.
///
/// Picking the same location twice for a user resolves to the same station, so a
/// user can end up with fewer stations than drawn. Returns the stations touched.
pub async fn assign_stations<S>(
    store: &S,
    users: &[UserAccount],
    locations: &[Location],
    per_user: RangeInclusive<usize>,
    rng: &mut impl Rng,
) -> Result<Vec<Station>, AppError>
where
    S: RecordStore + ?Sized,
{
    if locations.is_empty() {
        warn!("No candidate locations; no stations assigned");
        return Ok(Vec::new());
    }

    let mut stations = Vec::new();

    for user in users {
        let count = rng.gen_range(per_user.clone());
        for _ in 0..count {
            let Some(location) = locations.choose(rng) else {
                break;
            };
            let (station, created) = store.get_or_create_station(user.id, location.id).await?;
            if created {
                debug!("Created station for {} at location {}", user.name, location.id);
            }
            stations.push(station);
        }
    }

    Ok(stations)
}
