//! Mold solids in the truck B-rep kernel.

use cast_types::{DVector, FittedNurbs, TessellationResult};
use truck_modeling::geometry::{BSplineCurve, BSplineSurface, KnotVec};
use truck_modeling::topology::{Edge, Face, Solid, Vertex, Wire};
use truck_modeling::{builder, Curve, Point3, Surface, Vector3};

use crate::error::MoldError;

/// A finished mold piece: an owned B-rep solid plus the parameters it
/// was built with. Opaque on the wire; only the fitted surface data is
/// serialized.
#[derive(Debug, Clone)]
pub struct MoldSolid {
    pub solid: Solid,
    pub region_id: String,
    pub wall_thickness: f64,
    pub draft_angle_deg: Option<f64>,
}

/// Convert fitted NURBS data into a truck B-spline surface.
pub fn to_truck_surface(surface: &FittedNurbs) -> Result<BSplineSurface<Point3>, MoldError> {
    surface.validate()?;
    let mut control = Vec::with_capacity(surface.count_u);
    for i in 0..surface.count_u {
        let mut row = Vec::with_capacity(surface.count_v);
        for j in 0..surface.count_v {
            let p = surface.control_point(i, j);
            row.push(Point3::new(p[0], p[1], p[2]));
        }
        control.push(row);
    }
    Ok(BSplineSurface::new(
        (
            KnotVec::from(surface.knots_u.clone()),
            KnotVec::from(surface.knots_v.clone()),
        ),
        control,
    ))
}

/// Build a bounded face from a fitted surface with explicit B-spline
/// boundary curves extracted from the control net's border rows.
pub fn build_face(surface: &FittedNurbs) -> Result<Face, MoldError> {
    let truck_surface = to_truck_surface(surface)?;
    let (nu, nv) = (surface.count_u, surface.count_v);
    let at = |i: usize, j: usize| {
        let p = surface.control_point(i, j);
        Point3::new(p[0], p[1], p[2])
    };

    // Clamped surfaces interpolate their corner control points.
    let c00 = Vertex::new(at(0, 0));
    let c10 = Vertex::new(at(nu - 1, 0));
    let c11 = Vertex::new(at(nu - 1, nv - 1));
    let c01 = Vertex::new(at(0, nv - 1));

    let knots_u = KnotVec::from(surface.knots_u.clone());
    let knots_v = KnotVec::from(surface.knots_v.clone());

    let bottom: Vec<Point3> = (0..nu).map(|i| at(i, 0)).collect();
    let right: Vec<Point3> = (0..nv).map(|j| at(nu - 1, j)).collect();
    let top: Vec<Point3> = (0..nu).map(|i| at(i, nv - 1)).collect();
    let left: Vec<Point3> = (0..nv).map(|j| at(0, j)).collect();

    let edge = |a: &Vertex, b: &Vertex, knots: &KnotVec, points: Vec<Point3>| {
        Edge::new(
            a,
            b,
            Curve::BSplineCurve(BSplineCurve::new(knots.clone(), points)),
        )
    };
    let e_bottom = edge(&c00, &c10, &knots_u, bottom);
    let e_right = edge(&c10, &c11, &knots_v, right);
    let e_top = edge(&c01, &c11, &knots_u, top);
    let e_left = edge(&c00, &c01, &knots_v, left);

    let wire = Wire::from(vec![
        e_bottom,
        e_right,
        e_top.inverse(),
        e_left.inverse(),
    ]);
    Face::try_new(vec![wire], Surface::BSplineSurface(truck_surface)).map_err(|e| {
        MoldError::SolidConstructionFailed {
            reason: format!("face construction: {e}"),
        }
    })
}

/// Extrude the (possibly drafted) cavity surface into a mold body of
/// the given wall thickness, opposite the demolding direction.
///
/// This is the kernel's thick-shell realization: the cavity face sweeps
/// along the pull axis, so the mold back stays clear of the demolding
/// path by construction.
pub fn create_mold_solid(
    surface: &FittedNurbs,
    region_id: &str,
    direction: &DVector,
    wall_thickness: f64,
    draft_angle_deg: Option<f64>,
) -> Result<MoldSolid, MoldError> {
    if wall_thickness <= 0.0 {
        return Err(MoldError::InvalidWallThickness {
            thickness: wall_thickness,
        });
    }
    let norm = direction.norm();
    if norm < 1e-12 {
        return Err(MoldError::NullSurface);
    }
    let d = direction / norm;

    let face = build_face(surface)?;
    let sweep = Vector3::new(-d.x, -d.y, -d.z) * wall_thickness;
    let solid = builder::tsweep(&face, sweep);
    validate_solid(&solid)?;

    tracing::debug!(region_id, wall_thickness, "mold solid created");
    Ok(MoldSolid {
        solid,
        region_id: region_id.to_string(),
        wall_thickness,
        draft_angle_deg,
    })
}

/// Structural integrity of a finished solid: at least one boundary
/// shell, each with enough faces to close.
pub fn validate_solid(solid: &Solid) -> Result<(), MoldError> {
    let boundaries = solid.boundaries();
    if boundaries.is_empty() {
        return Err(MoldError::SolidConstructionFailed {
            reason: "solid has no boundary shells".into(),
        });
    }
    for shell in boundaries.iter() {
        if shell.face_iter().count() < 4 {
            return Err(MoldError::SolidConstructionFailed {
                reason: "boundary shell cannot enclose a volume".into(),
            });
        }
    }
    Ok(())
}

/// Triangulate a mold solid for display or STL hand-off. The
/// `parent_face` channel carries the ordinal of the B-rep face each
/// triangle came from.
pub fn tessellate_mold(mold: &MoldSolid, tolerance: f64) -> Result<TessellationResult, MoldError> {
    use truck_meshalgo::prelude::*;
    use truck_meshalgo::tessellation::MeshableShape;

    let meshed = mold.solid.triangulation(tolerance);

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut triangles = Vec::new();
    let mut parent_face = Vec::new();

    let mut face_ordinal = 0u32;
    for shell in meshed.boundaries().iter() {
        for face in shell.face_iter() {
            let Some(mut mesh): Option<PolygonMesh> = face.surface() else {
                face_ordinal += 1;
                continue;
            };
            if !face.orientation() {
                mesh.invert();
            }
            let base = vertices.len() as u32;
            let positions = mesh.positions();
            let mesh_normals = mesh.normals();
            for (k, p) in positions.iter().enumerate() {
                vertices.push(cast_types::Point::new(p[0] as f32, p[1] as f32, p[2] as f32));
                let n = mesh_normals
                    .get(k)
                    .map(|n| cast_types::Vector::new(n[0] as f32, n[1] as f32, n[2] as f32))
                    .unwrap_or_else(cast_types::Vector::z);
                normals.push(n);
            }
            for tri in mesh.tri_faces() {
                triangles.push([
                    base + tri[0].pos as u32,
                    base + tri[1].pos as u32,
                    base + tri[2].pos as u32,
                ]);
                parent_face.push(face_ordinal);
            }
            face_ordinal += 1;
        }
    }

    if vertices.is_empty() {
        return Err(MoldError::SolidConstructionFailed {
            reason: "tessellation produced no geometry".into(),
        });
    }
    Ok(TessellationResult {
        vertices,
        normals,
        triangles,
        parent_face,
    })
}
