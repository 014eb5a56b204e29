//! ARKit Mapping - ARKit blendshape names to rig morph names

use morphcast_core::MorphFrame;

/// Rig morph name for an ARKit blendshape
pub fn arkit_to_rig(name: &str) -> Option<&'static str> {
    let morph = match name {
        // Mouth / jaw
        "jawForward" => "Jaw_Forward",
        "jawLeft" => "Jaw_L",
        "jawRight" => "Jaw_R",
        "jawOpen" => "V_Open",
        "mouthClose" => "V_None",
        "mouthFunnel" => "V_OH",
        "mouthPucker" => "V_U",
        "mouthLeft" => "Mouth_L",
        "mouthRight" => "Mouth_R",
        "mouthSmileLeft" => "Mouth_Smile_L",
        "mouthSmileRight" => "Mouth_Smile_R",
        "mouthFrownLeft" => "Mouth_Frown_L",
        "mouthFrownRight" => "Mouth_Frown_R",
        "mouthDimpleLeft" => "Mouth_Dimple_L",
        "mouthDimpleRight" => "Mouth_Dimple_R",
        "mouthStretchLeft" => "Mouth_Stretch_L",
        "mouthStretchRight" => "Mouth_Stretch_R",
        "mouthRollLower" => "Mouth_Roll_Lower",
        "mouthRollUpper" => "Mouth_Roll_Upper",
        "mouthShrugLower" => "Mouth_Shrug_Lower",
        "mouthShrugUpper" => "Mouth_Shrug_Upper",
        "mouthPressLeft" => "Mouth_Press_L",
        "mouthPressRight" => "Mouth_Press_R",
        "mouthLowerDownLeft" => "Mouth_Lower_Down_L",
        "mouthLowerDownRight" => "Mouth_Lower_Down_R",
        "mouthUpperUpLeft" => "Mouth_Upper_Up_L",
        "mouthUpperUpRight" => "Mouth_Upper_Up_R",
        // Eyes
        "eyeBlinkLeft" => "Eye_Blink_L",
        "eyeBlinkRight" => "Eye_Blink_R",
        "eyeLookUpLeft" => "Eye_Look_Up_L",
        "eyeLookUpRight" => "Eye_Look_Up_R",
        "eyeLookDownLeft" => "Eye_Look_Down_L",
        "eyeLookDownRight" => "Eye_Look_Down_R",
        "eyeLookInLeft" => "Eye_Look_In_L",
        "eyeLookInRight" => "Eye_Look_In_R",
        "eyeLookOutLeft" => "Eye_Look_Out_L",
        "eyeLookOutRight" => "Eye_Look_Out_R",
        "eyeWideLeft" => "Eye_Wide_L",
        "eyeWideRight" => "Eye_Wide_R",
        "eyeSquintLeft" => "Eye_Squint_L",
        "eyeSquintRight" => "Eye_Squint_R",
        // Brows
        "browDownLeft" => "Brow_Drop_L",
        "browDownRight" => "Brow_Drop_R",
        "browInnerUp" => "Brow_Raise_Inner",
        "browOuterUpLeft" => "Brow_Raise_L",
        "browOuterUpRight" => "Brow_Raise_R",
        // Nose / cheeks / tongue
        "noseSneerLeft" => "Nose_Sneer_L",
        "noseSneerRight" => "Nose_Sneer_R",
        "cheekPuff" => "Cheek_Puff",
        "cheekSquintLeft" => "Cheek_Squint_L",
        "cheekSquintRight" => "Cheek_Squint_R",
        "tongueOut" => "Tongue_Out",
        _ => return None,
    };
    Some(morph)
}

/// Maps incoming capture names onto the rig
#[derive(Debug, Clone, Copy, Default)]
pub struct ArkitMapper;

impl ArkitMapper {
    pub fn new() -> Self {
        ArkitMapper
    }

    /// Map a set of named values. ARKit names are renamed; anything else
    /// (already a rig name, or a custom blendshape) passes through.
    /// Values are clamped to [0, 1]; NaN values are dropped.
    pub fn map<'a, I>(&self, input: I) -> MorphFrame
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        input
            .into_iter()
            .map(|(name, value)| (arkit_to_rig(name).unwrap_or(name), value))
            .collect()
    }

    /// Map a frame whose keys may use ARKit names
    pub fn map_frame(&self, frame: &MorphFrame) -> MorphFrame {
        self.map(frame.iter().map(|(k, v)| (k.as_str(), v)))
    }
}
