use crate::cache::{CacheService, CacheStatus};
use crate::models::{Movie, Venue};
use crate::store::{RecordStore, StoreResult};

pub const MOVIES_KEY: &str = "catalog:movies";
pub const VENUES_KEY: &str = "catalog:venues";

impl CacheService {
    // Сначала кеш, при промахе идем в хранилище и кладем результат в кеш
    pub async fn movies<S: RecordStore>(&self, store: &S) -> StoreResult<(Vec<Movie>, CacheStatus)> {
        if let Some(movies) = self.get_json::<Vec<Movie>>(MOVIES_KEY).await {
            return Ok((movies, CacheStatus::Hit));
        }
        let movies = store.list_movies().await?;
        self.put_json(MOVIES_KEY, &movies).await;
        Ok((movies, CacheStatus::Miss))
    }

    pub async fn venues<S: RecordStore>(&self, store: &S) -> StoreResult<(Vec<Venue>, CacheStatus)> {
        if let Some(venues) = self.get_json::<Vec<Venue>>(VENUES_KEY).await {
            return Ok((venues, CacheStatus::Hit));
        }
        let venues = store.list_venues().await?;
        self.put_json(VENUES_KEY, &venues).await;
        Ok((venues, CacheStatus::Miss))
    }
}
