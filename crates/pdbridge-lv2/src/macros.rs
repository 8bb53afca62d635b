/// Export one pdbridge plugin from a `cdylib`.
///
/// Defines the named unit struct, implements
/// [`PluginDefinition`](crate::PluginDefinition) for it and exports
/// `lv2_descriptor`. The port table is built and validated on first use.
///
/// ```ignore
/// use pdbridge_lv2::bridge::{BridgeConfig, PortSpec};
///
/// pdbridge_lv2::export_lv2_plugin! {
///     pub struct Gain;
///     uri: "https://example.org/plugins/gain",
///     ports: [
///         PortSpec::audio_in("in"),
///         PortSpec::audio_out("out"),
///         PortSpec::control_in("gain").with_range(0.0, 1.0, 2.0),
///     ],
///     config: BridgeConfig::default().patch_file("gain.pd"),
/// }
/// ```
#[macro_export]
macro_rules! export_lv2_plugin {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident;
        uri: $uri:literal,
        ports: [$($port:expr),* $(,)?],
        $(config: $config:expr,)?
    ) => {
        $(#[$meta])*
        $vis struct $name;

        impl $crate::PluginDefinition for $name {
            const URI: &'static ::std::ffi::CStr =
                match ::std::ffi::CStr::from_bytes_with_nul(concat!($uri, "\0").as_bytes()) {
                    Ok(uri) => uri,
                    Err(_) => panic!("plugin URI contains a NUL byte"),
                };

            fn port_table() -> Option<&'static ::std::sync::Arc<$crate::bridge::PortTable>> {
                static TABLE: ::std::sync::OnceLock<Option<::std::sync::Arc<$crate::bridge::PortTable>>> =
                    ::std::sync::OnceLock::new();
                TABLE
                    .get_or_init(|| $crate::build_port_table($uri, &[$($port),*]))
                    .as_ref()
            }

            $(
                fn config() -> $crate::bridge::BridgeConfig {
                    $config
                }
            )?
        }

        #[no_mangle]
        pub extern "C" fn lv2_descriptor(index: u32) -> *const $crate::LV2Descriptor {
            static DESCRIPTOR: $crate::Descriptor = $crate::Descriptor::of::<$name>();
            if index == 0 {
                DESCRIPTOR.as_raw()
            } else {
                ::std::ptr::null()
            }
        }
    };
}
