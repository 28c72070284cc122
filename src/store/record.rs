use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Географические координаты отслеживаемой сущности.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Отслеживаемая сущность (транспортное средство).
///
/// Авторитетная копия живёт во внешнем хранилище; ядро рассылки видит её
/// только как полезную нагрузку события.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Данные для создания новой сущности.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewVehicle {
    pub name: String,
    pub coordinates: Coordinates,
}

/// Отзыв о сущности. Отзывы хранятся, но не рассылаются.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub vehicle_id: String,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewReview {
    pub vehicle_id: String,
    pub rating: u8,
    pub comment: String,
}

impl Coordinates {
    pub fn new(
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Проверяет, что широта в `[-90, 90]`, а долгота в `[-180, 180]`.
    ///
    /// `NaN` и бесконечности отклоняются.
    pub fn validate(&self) -> Result<(), StoreError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(StoreError::InvalidCoordinates {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

impl Vehicle {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

impl NewReview {
    pub fn validate(&self) -> Result<(), StoreError> {
        if !(1..=5).contains(&self.rating) {
            return Err(StoreError::InvalidInput {
                reason: format!("rating must be in 1..=5, got {}", self.rating),
            });
        }
        Ok(())
    }
}
