use super::error::{DatasetError, DatasetResult};
use super::imageio::luma_to_tensor;
use candle_core::{DType, Device, Tensor};
use image::{GrayImage, Luma};
use serde::Deserialize;
use std::path::Path;

/// Joint count of the 18-point body format the keypoint files are produced in.
pub const DEFAULT_JOINTS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// Undetected joints are written out at (0, 0) or thereabouts.
    pub fn is_detected(&self) -> bool {
        self.x > 1.0 && self.y > 1.0
    }
}

#[derive(Debug, Deserialize)]
struct KeypointFile {
    people: Vec<Person>,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(alias = "pose_keypoints_2d")]
    pose_keypoints: Vec<f32>,
}

pub fn parse_keypoints(path: &Path, json: &str) -> DatasetResult<Vec<Keypoint>> {
    let file: KeypointFile = serde_json::from_str(json).map_err(|source| DatasetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let person = file
        .people
        .first()
        .ok_or_else(|| DatasetError::MalformedKeypoints {
            path: path.to_path_buf(),
            msg: "no people".into(),
        })?;
    if person.pose_keypoints.len() % 3 != 0 {
        return Err(DatasetError::MalformedKeypoints {
            path: path.to_path_buf(),
            msg: format!(
                "pose_keypoints length {} is not a multiple of 3",
                person.pose_keypoints.len()
            ),
        });
    }
    Ok(person
        .pose_keypoints
        .chunks_exact(3)
        .map(|c| Keypoint::new(c[0], c[1], c[2]))
        .collect())
}

pub fn read_keypoints(path: &Path) -> DatasetResult<Vec<Keypoint>> {
    let json = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    parse_keypoints(path, &json)
}

/// Raw 8-bit pose canvases, one per joint plus the shared visualization.
#[derive(Debug, Clone)]
pub struct PoseHeatmap {
    pub joints: Vec<GrayImage>,
    pub visual: GrayImage,
}

impl PoseHeatmap {
    pub fn build(keypoints: &[Keypoint], width: u32, height: u32, radius: u32) -> Self {
        let mut visual = GrayImage::new(width, height);
        let joints = keypoints
            .iter()
            .map(|kp| {
                let mut canvas = GrayImage::new(width, height);
                if kp.is_detected() {
                    draw_square(&mut canvas, kp.x, kp.y, radius);
                    draw_square(&mut visual, kp.x, kp.y, radius);
                }
                canvas
            })
            .collect();
        Self { joints, visual }
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    /// `(pose_map, im_pose)`: `(J, H, W)` and `(1, H, W)`, both in `[-1, 1]`.
    pub fn to_tensors(&self, device: &Device) -> DatasetResult<(Tensor, Tensor)> {
        let (w, h) = self.visual.dimensions();
        let pose_map = if self.joints.is_empty() {
            Tensor::zeros((0, h as usize, w as usize), DType::F32, device)?
        } else {
            let planes = self
                .joints
                .iter()
                .map(|c| luma_to_tensor(c, device))
                .collect::<DatasetResult<Vec<_>>>()?;
            Tensor::cat(&planes, 0)?
        };
        let im_pose = luma_to_tensor(&self.visual, device)?;
        Ok((pose_map, im_pose))
    }
}

/// Filled square of side `2r + 1` around the rounded point, clipped to the canvas.
fn draw_square(canvas: &mut GrayImage, x: f32, y: f32, r: u32) {
    let (w, h) = canvas.dimensions();
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    let r = r as i64;
    let x0 = cx.saturating_sub(r).max(0);
    let y0 = cy.saturating_sub(r).max(0);
    let x1 = cx.saturating_add(r).min(w as i64 - 1);
    let y1 = cy.saturating_add(r).min(h as i64 - 1);
    for py in y0..=y1 {
        for px in x0..=x1 {
            canvas.put_pixel(px as u32, py as u32, Luma([255]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_triples() {
        let json = r#"{"version": 1.0, "people": [{"pose_keypoints": [10, 20, 0.9, 0, 0, 0]}]}"#;
        let kps = parse_keypoints(Path::new("a_keypoints.json"), json).unwrap();
        assert_eq!(kps, vec![Keypoint::new(10.0, 20.0, 0.9), Keypoint::new(0.0, 0.0, 0.0)]);
        assert!(kps[0].is_detected());
        assert!(!kps[1].is_detected());
    }

    #[test]
    fn accepts_openpose_2d_field_name() {
        let json = r#"{"people": [{"pose_keypoints_2d": [5, 6, 1]}]}"#;
        let kps = parse_keypoints(Path::new("b.json"), json).unwrap();
        assert_eq!(kps.len(), 1);
    }

    #[test]
    fn rejects_malformed_files() {
        let p = Path::new("c.json");
        assert!(matches!(
            parse_keypoints(p, r#"{"people": []}"#),
            Err(DatasetError::MalformedKeypoints { .. })
        ));
        assert!(matches!(
            parse_keypoints(p, r#"{"people": [{"pose_keypoints": [1, 2]}]}"#),
            Err(DatasetError::MalformedKeypoints { .. })
        ));
        assert!(matches!(parse_keypoints(p, "{"), Err(DatasetError::Json { .. })));
    }

    #[test]
    fn missing_joint_leaves_blank_channel() {
        let kps = vec![Keypoint::new(0.0, 0.0, 0.0), Keypoint::new(1.0, 50.0, 0.5)];
        let heat = PoseHeatmap::build(&kps, 192, 256, 3);
        assert_eq!(heat.num_joints(), 2);
        assert!(heat.joints.iter().all(|c| c.as_raw().iter().all(|v| *v == 0)));
        assert!(heat.visual.as_raw().iter().all(|v| *v == 0));

        let (pose_map, im_pose) = heat.to_tensors(&Device::Cpu).unwrap();
        assert_eq!(pose_map.dims(), &[2, 256, 192]);
        assert_eq!(im_pose.dims(), &[1, 256, 192]);
        let v = pose_map.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(v.iter().all(|x| *x == -1.0));
    }

    #[test]
    fn detected_joint_draws_square() {
        let r = 3;
        let kps = vec![Keypoint::new(0.0, 0.0, 0.0), Keypoint::new(100.0, 100.0, 0.8)];
        let heat = PoseHeatmap::build(&kps, 192, 256, r);

        let canvas = &heat.joints[1];
        let lit = canvas.enumerate_pixels().filter(|(_, _, p)| p.0[0] == 255).collect::<Vec<_>>();
        assert_eq!(lit.len(), ((2 * r + 1) * (2 * r + 1)) as usize);
        for (x, y, _) in lit {
            assert!((97..=103).contains(&x) && (97..=103).contains(&y));
        }
        assert_eq!(heat.visual, *canvas);

        let (pose_map, im_pose) = heat.to_tensors(&Device::Cpu).unwrap();
        let pm = pose_map.to_vec3::<f32>().unwrap();
        assert_eq!(pm[1][100][100], 1.0);
        assert_eq!(pm[1][96][100], -1.0);
        assert_eq!(pm[0][100][100], -1.0);
        assert_eq!(im_pose.to_vec3::<f32>().unwrap()[0][103][97], 1.0);
    }

    #[test]
    fn far_out_coordinates_draw_nothing() {
        let kps = vec![
            Keypoint::new(f32::MAX, f32::MAX, 1.0),
            Keypoint::new(1e30, 40.0, 1.0),
            Keypoint::new(f32::INFINITY, 10.0, 1.0),
        ];
        let heat = PoseHeatmap::build(&kps, 64, 64, 3);
        assert_eq!(heat.num_joints(), 3);
        assert!(heat.visual.as_raw().iter().all(|v| *v == 0));
    }

    #[test]
    fn visualization_accumulates_and_clips() {
        let kps = vec![Keypoint::new(2.0, 2.0, 1.0), Keypoint::new(50.0, 60.0, 1.0)];
        let heat = PoseHeatmap::build(&kps, 64, 64, 3);
        // the first square is clipped at the border
        assert_eq!(
            heat.joints[0].as_raw().iter().filter(|v| **v == 255).count(),
            6 * 6
        );
        assert_eq!(heat.visual.get_pixel(2, 2).0[0], 255);
        assert_eq!(heat.visual.get_pixel(50, 60).0[0], 255);
    }
}
