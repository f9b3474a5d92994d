//! Selection of the output device playback is started on.

use spotify_api::Device;

use crate::error::{Operation, PlaybackError, Result};
use crate::service::PlaybackService;

/// An addressable output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTarget {
    pub id: String,
    pub name: String,
}

/// Picks the device a Start operation plays on.
///
/// Selects the first device, in the service's order, that can be addressed
/// by id. Devices are queried on every call.
pub struct DeviceResolver;

impl DeviceResolver {
    /// Query the service and select a target.
    pub async fn resolve<S: PlaybackService + ?Sized>(service: &S) -> Result<PlaybackTarget> {
        let devices = service
            .devices()
            .await
            .map_err(PlaybackError::during(Operation::ListDevices))?;
        tracing::debug!("Found {} device(s)", devices.len());

        let target = Self::first_available(devices)?;
        tracing::info!("Using device '{}' ({})", target.name, target.id);
        Ok(target)
    }

    /// Select the first device that carries an id.
    pub fn first_available(devices: Vec<Device>) -> Result<PlaybackTarget> {
        devices
            .into_iter()
            .find_map(|device| {
                let Device { id, name, .. } = device;
                id.map(|id| PlaybackTarget { id, name })
            })
            .ok_or(PlaybackError::NoDevicesFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{device, Call, MockPlaybackService};

    #[test]
    fn test_first_available_keeps_service_order() {
        let target = DeviceResolver::first_available(vec![
            device(Some("a"), "Living Room"),
            device(Some("b"), "Kitchen"),
        ])
        .unwrap();

        assert_eq!(
            target,
            PlaybackTarget {
                id: "a".to_string(),
                name: "Living Room".to_string()
            }
        );
    }

    #[test]
    fn test_first_available_skips_devices_without_id() {
        let target = DeviceResolver::first_available(vec![
            device(None, "Restricted TV"),
            device(Some("b"), "Kitchen"),
        ])
        .unwrap();
        assert_eq!(target.id, "b");
    }

    #[test]
    fn test_empty_list_is_an_error() {
        assert!(matches!(
            DeviceResolver::first_available(Vec::new()),
            Err(PlaybackError::NoDevicesFound)
        ));
        assert!(matches!(
            DeviceResolver::first_available(vec![device(None, "Restricted TV")]),
            Err(PlaybackError::NoDevicesFound)
        ));
    }

    #[tokio::test]
    async fn test_resolve_queries_every_time() {
        let service = MockPlaybackService::single_device();

        DeviceResolver::resolve(&service).await.unwrap();
        DeviceResolver::resolve(&service).await.unwrap();

        assert_eq!(service.calls(), vec![Call::Devices, Call::Devices]);
    }

    #[tokio::test]
    async fn test_resolve_listing_failure() {
        let service = MockPlaybackService::single_device();
        service.fail_devices();

        let error = DeviceResolver::resolve(&service).await.unwrap_err();
        assert!(matches!(
            error,
            PlaybackError::Service {
                operation: Operation::ListDevices,
                ..
            }
        ));
    }
}
