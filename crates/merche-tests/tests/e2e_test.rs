//! End-to-end tests for the merche client
//!
//! A mock API serves a complete test vehicle; one client instance is shared
//! by every call in a test.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use merche_client::testing::{MockApi, TestServer};
use merche_client::{
    container_path, CancellationToken, Container, Domain, ElectricVehicleStatus, FuelStatus,
    MercheClient, MercheError, Options, PayAsYouDriveStatus, Resource, ResourceMetaInfo,
    VehicleLockStatus, VehicleStatus,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;

const VIN: &str = "WDD2221821A000001";
const OTHER_VIN: &str = "WDD2221821A000002";

/// Mock API with every container populated for `VIN`
fn full_vehicle() -> MockApi {
    MockApi::new()
        .resources(
            VIN,
            &[
                meta("rangeliquid"),
                meta("soc"),
                meta("doorlockstatusvehicle"),
                meta("odo"),
            ],
        )
        .container(
            VIN,
            &[
                VehicleStatus {
                    doorstatusfrontleft: Some(Resource::new("false", 1541751294000)),
                    ..Default::default()
                },
                VehicleStatus {
                    sunroofstatus: Some(Resource::new("1", 1541751044000)),
                    ..Default::default()
                },
            ],
        )
        .container(
            VIN,
            &[
                FuelStatus {
                    rangeliquid: Some(Resource::new("1648", 1541406596000)),
                    ..Default::default()
                },
                FuelStatus {
                    tanklevelpercent: Some(Resource::new("84", 1541233886000)),
                    ..Default::default()
                },
            ],
        )
        .container(
            VIN,
            &[
                ElectricVehicleStatus {
                    soc: Some(Resource::new("35", 1541749824000)),
                    ..Default::default()
                },
                ElectricVehicleStatus {
                    rangeelectric: Some(Resource::new("1021", 1541749824000)),
                    ..Default::default()
                },
            ],
        )
        .container(
            VIN,
            &[VehicleLockStatus {
                doorlockstatusvehicle: Some(Resource::new("1", 1541749824000)),
                ..Default::default()
            }],
        )
        .container(
            VIN,
            &[PayAsYouDriveStatus {
                odo: Some(Resource::new("319947", 1541749824000)),
            }],
        )
}

fn meta(name: &str) -> ResourceMetaInfo {
    ResourceMetaInfo {
        href: Some(format!("/vehicles/{}/resources/{}", VIN, name)),
        name: Some(name.to_string()),
        version: Some("1.0".to_string()),
    }
}

/// Fold a container into `wire name -> value`; later elements win
fn merge<T: Container>(items: &[T]) -> BTreeMap<&'static str, String> {
    items
        .iter()
        .flat_map(|item| item.populated())
        .filter_map(|(name, resource)| resource.value.clone().map(|v| (name, v)))
        .collect()
}

async fn start(api: &MockApi) -> TestServer {
    TestServer::start(api.router())
        .await
        .expect("Failed to start test server")
}

#[tokio::test]
async fn test_read_every_domain_with_one_client() {
    let api = full_vehicle();
    let server = start(&api).await;
    let client = server.client();
    let ctx = CancellationToken::new();
    let opts = Options::new(VIN);

    let resources = client.available_resources(&ctx, &opts).await.unwrap();
    assert_eq!(resources.data.len(), 4);

    let vehicle = client.vehicle_status(&ctx, &opts).await.unwrap().data;
    let fuel = client.fuel_status(&ctx, &opts).await.unwrap().data;
    let ev = client.electric_vehicle_status(&ctx, &opts).await.unwrap().data;
    let lock = client.vehicle_lock_status(&ctx, &opts).await.unwrap().data;
    let payd = client.pay_as_you_drive_status(&ctx, &opts).await.unwrap().data;

    assert_eq!(
        merge(&vehicle),
        BTreeMap::from([
            ("doorstatusfrontleft", "false".to_string()),
            ("sunroofstatus", "1".to_string()),
        ])
    );
    assert_eq!(
        merge(&fuel),
        BTreeMap::from([
            ("rangeliquid", "1648".to_string()),
            ("tanklevelpercent", "84".to_string()),
        ])
    );
    assert_eq!(
        merge(&ev),
        BTreeMap::from([
            ("rangeelectric", "1021".to_string()),
            ("soc", "35".to_string()),
        ])
    );
    assert_eq!(
        merge(&lock),
        BTreeMap::from([("doorlockstatusvehicle", "1".to_string())])
    );
    assert_eq!(merge(&payd), BTreeMap::from([("odo", "319947".to_string())]));

    let paths: Vec<String> = api.requests().into_iter().map(|r| r.path).collect();
    let mut expected = vec![format!("/vehicledata/v2/vehicles/{}/resources", VIN)];
    expected.extend(
        Domain::ALL
            .iter()
            .map(|domain| format!("/{}", container_path(VIN, *domain))),
    );
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn test_generic_container_accessor_matches_named_one() {
    let api = full_vehicle();
    let server = start(&api).await;
    let ctx = CancellationToken::new();
    let opts = Options::new(VIN);

    let named = server.client.fuel_status(&ctx, &opts).await.unwrap().data;
    let generic = server
        .client
        .container::<FuelStatus>(&ctx, &opts)
        .await
        .unwrap()
        .data;

    assert_eq!(named, generic);
}

#[tokio::test]
async fn test_unknown_vehicle_is_not_found() {
    let api = full_vehicle();
    let server = start(&api).await;
    let ctx = CancellationToken::new();

    let err = server
        .client
        .fuel_status(&ctx, &Options::new(OTHER_VIN))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.to_string(), "Not Found");
}

#[tokio::test]
async fn test_concurrent_calls_share_client() {
    let api = full_vehicle();
    let server = start(&api).await;
    let client: Arc<MercheClient> = Arc::new(server.client.clone());
    let ctx = CancellationToken::new();

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = Arc::clone(&client);
        let ctx = ctx.clone();
        handles.push(tokio::spawn(async move {
            let opts = Options::new(VIN);
            if i % 2 == 0 {
                client.fuel_status(&ctx, &opts).await.map(|r| r.data.len())
            } else {
                client
                    .electric_vehicle_status(&ctx, &opts)
                    .await
                    .map(|r| r.data.len())
            }
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 2);
    }
    assert_eq!(api.requests().len(), 16);
}

#[tokio::test]
async fn test_cancelled_before_call_sends_nothing() {
    let api = full_vehicle();
    let server = start(&api).await;
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = server
        .client
        .fuel_status(&ctx, &Options::new(VIN))
        .await
        .unwrap_err();

    assert!(matches!(err, MercheError::Cancelled));
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn test_cancel_in_flight_aborts_call() {
    let fuel_path = format!("/{}", container_path(VIN, Domain::FuelStatus));
    let api = full_vehicle().delay(&fuel_path, Duration::from_secs(30));
    let server = start(&api).await;
    let ctx = CancellationToken::new();

    let canceller = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.cancel();
        })
    };

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        server.client.fuel_status(&ctx, &Options::new(VIN)),
    )
    .await
    .expect("cancellation did not abort the call")
    .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, MercheError::Aborted { response: None }));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_cancellation_is_per_call() {
    let api = full_vehicle();
    let server = start(&api).await;
    let opts = Options::new(VIN);

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(odometer(&server.client, &cancelled, &opts).await.is_err());

    let live = CancellationToken::new();
    assert_eq!(
        odometer(&server.client, &live, &opts).await.unwrap(),
        Some("319947".to_string())
    );
}

async fn odometer(
    client: &MercheClient,
    ctx: &CancellationToken,
    opts: &Options,
) -> merche_client::Result<Option<String>> {
    let status = client.pay_as_you_drive_status(ctx, opts).await?.data;
    Ok(status
        .into_iter()
        .find_map(|s| s.odo.and_then(|odo| odo.value)))
}
