//! Tests for resolving the resource address.

use rstest::*;

use oscope_scpi::{
    ConnectionConfig, ResourceScanner, ScopeError, find_oscilloscope, match_known_scope,
    resolve_resource,
};
use scpirs::{InstrumentError, UsbResource};

const KEYSIGHT_USB: &str = "USB0::0x0957::0x17BC::MY56310625::INSTR";

/// A scanner that must not be used.
struct PanicScanner;

impl ResourceScanner for PanicScanner {
    fn usb_resources(&mut self) -> Result<Vec<UsbResource>, InstrumentError> {
        panic!("The USB bus must not be scanned.");
    }
}

/// A scanner whose USB stack fails.
struct FailingScanner;

impl ResourceScanner for FailingScanner {
    fn usb_resources(&mut self) -> Result<Vec<UsbResource>, InstrumentError> {
        Err(InstrumentError::InterfaceNotAvailable("usb"))
    }
}

fn resource(address: &str, manufacturer: Option<&str>, product: Option<&str>) -> UsbResource {
    UsbResource {
        manufacturer: manufacturer.map(String::from),
        product: product.map(String::from),
        ..UsbResource::new(address)
    }
}

#[fixture]
fn scope_on_bus() -> Vec<UsbResource> {
    vec![
        resource("USB0::0x1234::0x0001::ABC::INSTR", Some("TEKTRONIX"), None),
        UsbResource::new(KEYSIGHT_USB),
    ]
}

#[rstest]
fn test_explicit_resource_wins(mut scope_on_bus: Vec<UsbResource>) {
    let config = ConnectionConfig {
        resource: Some("TCPIP0::192.168.1.100::INSTR".to_string()),
        env_resource: Some("TCPIP0::10.0.0.1::INSTR".to_string()),
        auto_detect: true,
    };
    assert_eq!(
        resolve_resource(&config, &mut scope_on_bus).unwrap(),
        "TCPIP0::192.168.1.100::INSTR"
    );
}

#[rstest]
fn test_explicit_resource_does_not_scan() {
    let config = ConnectionConfig::new(Some(KEYSIGHT_USB.to_string()));
    assert_eq!(
        resolve_resource(&config, &mut PanicScanner).unwrap(),
        KEYSIGHT_USB
    );
}

#[rstest]
#[case(None)]
#[case(Some(""))]
fn test_env_resource_fallback(#[case] explicit: Option<&str>) {
    let config = ConnectionConfig {
        resource: explicit.map(String::from),
        env_resource: Some("TCPIP0::10.0.0.1::INSTR".to_string()),
        auto_detect: true,
    };
    assert_eq!(
        resolve_resource(&config, &mut PanicScanner).unwrap(),
        "TCPIP0::10.0.0.1::INSTR"
    );
}

/// Non-empty values are returned unchanged, even if they are only whitespace.
#[rstest]
#[case(Some(" "), Some("TCPIP0::10.0.0.1::INSTR"), " ")]
#[case(Some(" TCPIP0::192.168.1.100::INSTR "), None, " TCPIP0::192.168.1.100::INSTR ")]
#[case(None, Some(" "), " ")]
#[case(Some(""), Some("\t"), "\t")]
fn test_resource_returned_unchanged(
    #[case] explicit: Option<&str>,
    #[case] env: Option<&str>,
    #[case] expected: &str,
) {
    let config = ConnectionConfig {
        resource: explicit.map(String::from),
        env_resource: env.map(String::from),
        auto_detect: false,
    };
    assert_eq!(
        resolve_resource(&config, &mut PanicScanner).unwrap(),
        expected
    );
}

#[rstest]
fn test_auto_detect_known_scope(mut scope_on_bus: Vec<UsbResource>) {
    let config = ConnectionConfig::default();
    assert_eq!(
        resolve_resource(&config, &mut scope_on_bus).unwrap(),
        KEYSIGHT_USB
    );
}

#[rstest]
fn test_auto_detect_by_product_descriptor() {
    let mut resources = vec![resource(
        "USB0::0x0957::0x1796::SN0001::INSTR",
        Some("Agilent Technologies"),
        Some("DSO-X 2024A"),
    )];
    let config = ConnectionConfig::default();
    assert_eq!(
        resolve_resource(&config, resources.as_mut_slice()).unwrap(),
        "USB0::0x0957::0x1796::SN0001::INSTR"
    );
}

#[rstest]
fn test_auto_detect_takes_first_match() {
    let mut resources = vec![
        UsbResource::new("USB0::0x1AB1::0x044C::DHO9A000000001::INSTR"),
        UsbResource::new(KEYSIGHT_USB),
    ];
    let config = ConnectionConfig::default();
    assert_eq!(
        resolve_resource(&config, &mut resources).unwrap(),
        "USB0::0x1AB1::0x044C::DHO9A000000001::INSTR"
    );
}

#[rstest]
fn test_auto_detect_no_known_scope() {
    let mut resources = vec![resource(
        "USB0::0x0699::0x0368::C012345::INSTR",
        Some("TEKTRONIX"),
        Some("TDS 2024C"),
    )];
    let config = ConnectionConfig::default();
    assert!(matches!(
        resolve_resource(&config, &mut resources),
        Err(ScopeError::NoUsbOscilloscope)
    ));
}

#[rstest]
fn test_auto_detect_empty_bus() {
    let config = ConnectionConfig::default();
    assert!(matches!(
        resolve_resource(&config, &mut Vec::<UsbResource>::new()),
        Err(ScopeError::NoUsbOscilloscope)
    ));
}

#[rstest]
fn test_auto_detect_disabled() {
    let config = ConnectionConfig::new(None).auto_detect(false);
    assert!(matches!(
        resolve_resource(&config, &mut PanicScanner),
        Err(ScopeError::NoResourceSpecified)
    ));
}

#[rstest]
fn test_auto_detect_scan_error() {
    let config = ConnectionConfig::default();
    assert!(matches!(
        resolve_resource(&config, &mut FailingScanner),
        Err(ScopeError::Instrument(
            InstrumentError::InterfaceNotAvailable("usb")
        ))
    ));
}

#[rstest]
#[case("MY56310625", Some("Keysight"))]
#[case("DSO-X 3034A", Some("Keysight"))]
#[case("RIGOL TECHNOLOGIES", Some("Rigol"))]
#[case("DHO9A000000001", Some("Rigol"))]
#[case("AGILENT TECHNOLOGIES", Some("Agilent"))]
#[case("TEKTRONIX", None)]
#[case("TEKTRONIX MDO3014", None)]
#[case("my56310625", None)]
#[case("", None)]
fn test_match_known_scope(#[case] identity: &str, #[case] vendor: Option<&str>) {
    assert_eq!(match_known_scope(identity), vendor);
}

#[rstest]
fn test_find_oscilloscope_vendor(scope_on_bus: Vec<UsbResource>) {
    let (res, vendor) = find_oscilloscope(&scope_on_bus).unwrap();
    assert_eq!(res.address, KEYSIGHT_USB);
    assert_eq!(vendor, "Keysight");
}
