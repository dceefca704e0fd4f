//! Header names of the partial-render convention.
//!
//! A request carrying the marker header asks for a fragment named by the
//! fragment header. When a fragment was requested but the full page
//! answered anyway, the response carries the retarget header so the
//! client swaps the whole document instead of the missing fragment.

/// Request marker: `"true"` means the client wants a partial render.
pub const PARTIAL_MARKER: &str = "hx-request";

/// Request header naming the fragment, in hyphenated form.
pub const FRAGMENT: &str = "hx-target";

/// Response header set when a fragment request fell back to the full page.
pub const RETARGET: &str = "hx-retarget";

/// Retarget value directing the client to replace the whole document.
pub const RETARGET_BODY: &str = "body";
