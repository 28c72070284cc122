//! Внешнее хранилище записей.
//!
//! Ядро рассылки не владеет состоянием сущностей: хранилище внедряется в
//! точки мутации (`service`) через трейт [`RecordStore`].
//!
//! - `record`: типы записей (сущности, отзывы, координаты).
//! - `memory`: эталонная in-memory реализация.

pub mod memory;
pub mod record;

pub use memory::InMemoryStore;
pub use record::{Coordinates, NewReview, NewVehicle, Review, Vehicle};

use async_trait::async_trait;

use crate::StoreError;

/// Операции запрос/ответ над хранилищем записей.
///
/// Успешный `Ok` от пишущих методов означает, что запись применена; только
/// после этого разрешено вызывать рассылку.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError>;

    async fn get_vehicle(
        &self,
        id: &str,
    ) -> Result<Vehicle, StoreError>;

    async fn create_vehicle(
        &self,
        vehicle: NewVehicle,
    ) -> Result<Vehicle, StoreError>;

    /// Обновляет координаты и возвращает состояние после изменения.
    async fn update_location(
        &self,
        id: &str,
        coordinates: Coordinates,
    ) -> Result<Vehicle, StoreError>;

    async fn list_reviews(
        &self,
        vehicle_id: &str,
    ) -> Result<Vec<Review>, StoreError>;

    async fn create_review(
        &self,
        review: NewReview,
    ) -> Result<Review, StoreError>;
}

#[async_trait]
impl<T> RecordStore for std::sync::Arc<T>
where
    T: RecordStore + ?Sized,
{
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        (**self).list_vehicles().await
    }

    async fn get_vehicle(
        &self,
        id: &str,
    ) -> Result<Vehicle, StoreError> {
        (**self).get_vehicle(id).await
    }

    async fn create_vehicle(
        &self,
        vehicle: NewVehicle,
    ) -> Result<Vehicle, StoreError> {
        (**self).create_vehicle(vehicle).await
    }

    async fn update_location(
        &self,
        id: &str,
        coordinates: Coordinates,
    ) -> Result<Vehicle, StoreError> {
        (**self).update_location(id, coordinates).await
    }

    async fn list_reviews(
        &self,
        vehicle_id: &str,
    ) -> Result<Vec<Review>, StoreError> {
        (**self).list_reviews(vehicle_id).await
    }

    async fn create_review(
        &self,
        review: NewReview,
    ) -> Result<Review, StoreError> {
        (**self).create_review(review).await
    }
}
