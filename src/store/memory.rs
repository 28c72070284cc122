use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Coordinates, NewReview, NewVehicle, RecordStore, Review, Vehicle};
use crate::StoreError;

/// In-memory хранилище записей.
///
/// Идентификаторы выдаются монотонно: "1", "2", ... Ключи `BTreeMap`
/// хранятся как числа, чтобы `list_vehicles` отдавал записи в порядке
/// создания.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    vehicles: RwLock<BTreeMap<u64, Vehicle>>,
    reviews: RwLock<Vec<Review>>,
    next_vehicle_id: AtomicU64,
    next_review_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Создаёт хранилище с заранее заполненными сущностями.
    pub fn with_vehicles<I>(vehicles: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = NewVehicle>,
    {
        let store = Self::new();
        for vehicle in vehicles {
            store.insert_vehicle(vehicle)?;
        }
        Ok(store)
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.read().len()
    }

    fn insert_vehicle(
        &self,
        vehicle: NewVehicle,
    ) -> Result<Vehicle, StoreError> {
        if vehicle.name.trim().is_empty() {
            return Err(StoreError::InvalidInput {
                reason: "vehicle name must not be empty".to_string(),
            });
        }
        vehicle.coordinates.validate()?;

        let id = self.next_vehicle_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = Vehicle {
            id: id.to_string(),
            name: vehicle.name,
            latitude: vehicle.coordinates.latitude,
            longitude: vehicle.coordinates.longitude,
        };
        self.vehicles.write().insert(id, record.clone());
        Ok(record)
    }
}

fn parse_id(id: &str) -> Result<u64, StoreError> {
    id.parse().map_err(|_| StoreError::VehicleNotFound { id: id.to_string() })
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self.vehicles.read().values().cloned().collect())
    }

    async fn get_vehicle(
        &self,
        id: &str,
    ) -> Result<Vehicle, StoreError> {
        let key = parse_id(id)?;
        self.vehicles
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::VehicleNotFound { id: id.to_string() })
    }

    async fn create_vehicle(
        &self,
        vehicle: NewVehicle,
    ) -> Result<Vehicle, StoreError> {
        self.insert_vehicle(vehicle)
    }

    async fn update_location(
        &self,
        id: &str,
        coordinates: Coordinates,
    ) -> Result<Vehicle, StoreError> {
        coordinates.validate()?;
        let key = parse_id(id)?;

        let mut vehicles = self.vehicles.write();
        let vehicle = vehicles
            .get_mut(&key)
            .ok_or_else(|| StoreError::VehicleNotFound { id: id.to_string() })?;
        vehicle.latitude = coordinates.latitude;
        vehicle.longitude = coordinates.longitude;
        Ok(vehicle.clone())
    }

    async fn list_reviews(
        &self,
        vehicle_id: &str,
    ) -> Result<Vec<Review>, StoreError> {
        Ok(self
            .reviews
            .read()
            .iter()
            .filter(|r| r.vehicle_id == vehicle_id)
            .cloned()
            .collect())
    }

    async fn create_review(
        &self,
        review: NewReview,
    ) -> Result<Review, StoreError> {
        review.validate()?;
        // Отзыв допустим только для существующей сущности.
        self.get_vehicle(&review.vehicle_id).await?;

        let id = self.next_review_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = Review {
            id: id.to_string(),
            vehicle_id: review.vehicle_id,
            rating: review.rating,
            comment: review.comment,
        };
        self.reviews.write().push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_vehicle(name: &str) -> NewVehicle {
        NewVehicle {
            name: name.to_string(),
            coordinates: Coordinates::new(10.0, 20.0),
        }
    }

    /// Тест проверяет монотонную выдачу идентификаторов и порядок списка.
    #[tokio::test]
    async fn test_create_and_list_in_order() {
        let store = InMemoryStore::new();
        let a = store.create_vehicle(new_vehicle("bus-12")).await.unwrap();
        let b = store.create_vehicle(new_vehicle("tram-3")).await.unwrap();
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");

        let all = store.list_vehicles().await.unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[tokio::test]
    async fn test_update_location_returns_post_change_state() {
        let store = InMemoryStore::with_vehicles([new_vehicle("bus-12")]).unwrap();
        let updated = store
            .update_location("1", Coordinates::new(-33.86, 151.2))
            .await
            .unwrap();
        assert_eq!(updated.coordinates(), Coordinates::new(-33.86, 151.2));
        assert_eq!(store.get_vehicle("1").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_unknown_vehicle() {
        let store = InMemoryStore::new();
        let err = store
            .update_location("42", Coordinates::new(0.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::VehicleNotFound { id: "42".into() });

        let err = store.get_vehicle("not-a-number").await.unwrap_err();
        assert!(matches!(err, StoreError::VehicleNotFound { .. }));
    }

    /// Тест проверяет, что некорректные координаты не меняют запись.
    #[tokio::test]
    async fn test_invalid_coordinates_leave_record_untouched() {
        let store = InMemoryStore::with_vehicles([new_vehicle("bus-12")]).unwrap();
        let err = store
            .update_location("1", Coordinates::new(120.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCoordinates { .. }));
        assert_eq!(
            store.get_vehicle("1").await.unwrap().coordinates(),
            Coordinates::new(10.0, 20.0)
        );
    }

    #[tokio::test]
    async fn test_reviews_require_existing_vehicle() {
        let store = InMemoryStore::with_vehicles([new_vehicle("bus-12")]).unwrap();
        let review = store
            .create_review(NewReview {
                vehicle_id: "1".into(),
                rating: 4,
                comment: "on time".into(),
            })
            .await
            .unwrap();
        assert_eq!(store.list_reviews("1").await.unwrap(), vec![review]);

        let err = store
            .create_review(NewReview {
                vehicle_id: "9".into(),
                rating: 4,
                comment: "ghost".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VehicleNotFound { .. }));
        assert!(store.list_reviews("9").await.unwrap().is_empty());
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = InMemoryStore::with_vehicles([new_vehicle("  ")]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }
}
