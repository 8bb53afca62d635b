//! The host's `urid:map` feature.

use std::ffi::{c_void, CStr};

use lv2_raw::{
    LV2Feature, LV2Urid, LV2UridMap, LV2_ATOM__FRAMETIME, LV2_ATOM__SEQUENCE, LV2_MIDI__MIDIEVENT,
    LV2_URID__MAP,
};
use pdbridge_core::{BridgeError, Result, Urids};

/// Find `uri` in a null-terminated LV2 feature array.
///
/// # Safety
///
/// `features` must be null or a valid null-terminated feature array.
pub unsafe fn find_feature(features: *const *const LV2Feature, uri: &str) -> Option<*mut c_void> {
    if features.is_null() {
        return None;
    }
    let mut cursor = features;
    loop {
        let feature = *cursor;
        if feature.is_null() {
            return None;
        }
        let feature = &*feature;
        if !feature.uri.is_null() && CStr::from_ptr(feature.uri).to_bytes() == uri.as_bytes() {
            return Some(feature.data);
        }
        cursor = cursor.add(1);
    }
}

/// Map one of lv2_raw's NUL-terminated URI constants.
fn map_one(map: &LV2UridMap, uri: &'static [u8]) -> Result<LV2Urid> {
    let uri = CStr::from_bytes_with_nul(uri).map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
    // The host keeps `map` valid for the plugin's lifetime.
    let urid = (map.map)(map.handle, uri.as_ptr());
    if urid == 0 {
        return Err(BridgeError::MissingFeature("urid:map (host mapped a URI to 0)"));
    }
    Ok(urid)
}

/// Map the URIs the bridge needs through the host's `urid:map`.
///
/// # Safety
///
/// As for [`find_feature`]; the feature's data must be an `LV2_URID_Map`.
pub unsafe fn map_urids(features: *const *const LV2Feature) -> Result<Urids> {
    let data = find_feature(features, LV2_URID__MAP)
        .filter(|data| !data.is_null())
        .ok_or(BridgeError::MissingFeature("urid:map"))?;
    let map = &*(data as *const LV2UridMap);
    Ok(Urids {
        atom_sequence: map_one(map, LV2_ATOM__SEQUENCE)?,
        atom_frame_time: map_one(map, LV2_ATOM__FRAMETIME)?,
        midi_event: map_one(map, LV2_MIDI__MIDIEVENT)?,
    })
}
