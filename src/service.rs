//! Точки мутации: запись в хранилище и рассылка после подтверждения.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    pubsub::{Broadcaster, Change, CommitHook, TopicRegistry},
    store::{Coordinates, NewReview, NewVehicle, RecordStore, Review, Vehicle},
    StoreError,
};

/// Сервис сущностей поверх внедрённого хранилища.
///
/// Хуки вызываются ровно один раз на каждую успешную запись и только
/// после того, как хранилище вернуло `Ok`. Неудачная запись ничего не
/// рассылает.
///
/// Порядок событий следует порядку вызова хуков, а не порядку фиксации в
/// хранилище: два параллельных `update_location` одной сущности могут
/// разослать снимки в обратном порядке.
pub struct VehicleService<S> {
    store: S,
    hooks: Vec<Arc<dyn CommitHook>>,
}

impl<S: RecordStore> VehicleService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            hooks: Vec::new(),
        }
    }

    /// Сервис с одним хуком рассылки в `registry`.
    pub fn with_broadcaster(
        store: S,
        registry: TopicRegistry,
    ) -> Self {
        let mut service = Self::new(store);
        service.add_hook(Arc::new(Broadcaster::new(registry)));
        service
    }

    pub fn add_hook(
        &mut self,
        hook: Arc<dyn CommitHook>,
    ) {
        self.hooks.push(hook);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        self.store.list_vehicles().await
    }

    pub async fn get_vehicle(
        &self,
        id: &str,
    ) -> Result<Vehicle, StoreError> {
        self.store.get_vehicle(id).await
    }

    pub async fn create_vehicle(
        &self,
        vehicle: NewVehicle,
    ) -> Result<Vehicle, StoreError> {
        let created = self.store.create_vehicle(vehicle).await.map_err(|e| {
            warn!(error = %e, "create_vehicle rejected by store");
            e
        })?;
        debug!(vehicle_id = %created.id, name = %created.name, "vehicle created");
        self.commit(Change::VehicleCreated(created.clone()));
        Ok(created)
    }

    pub async fn update_location(
        &self,
        id: &str,
        coordinates: Coordinates,
    ) -> Result<Vehicle, StoreError> {
        let updated = self
            .store
            .update_location(id, coordinates)
            .await
            .map_err(|e| {
                warn!(vehicle_id = id, error = %e, "update_location rejected by store");
                e
            })?;
        debug!(
            vehicle_id = %updated.id,
            latitude = updated.latitude,
            longitude = updated.longitude,
            "vehicle moved"
        );
        self.commit(Change::VehicleLocationUpdated(updated.clone()));
        Ok(updated)
    }

    pub async fn list_reviews(
        &self,
        vehicle_id: &str,
    ) -> Result<Vec<Review>, StoreError> {
        self.store.list_reviews(vehicle_id).await
    }

    /// Отзывы сохраняются, но не рассылаются.
    pub async fn create_review(
        &self,
        review: NewReview,
    ) -> Result<Review, StoreError> {
        self.store.create_review(review).await
    }

    fn commit(
        &self,
        change: Change,
    ) {
        for hook in &self.hooks {
            hook.on_commit(&change);
        }
    }
}
