//! Regular bicubic patches: classification, control-net extraction, and
//! uniform B-spline evaluation.
//!
//! A quad is "regular" when the limit surface over it is a single
//! uniform bicubic B-spline of the 4×4 surrounding control points.
//! Missing neighbors across a hard boundary are synthesized by
//! reflection, which reproduces the edge-and-corner boundary rules of
//! the refiner exactly.

use cast_types::{DPoint, DVector};

use crate::chart::Chart2;
use crate::mesh::SubdMesh;

/// Position and derivatives of the surface at one parameter, with
/// respect to some local `(s, t)` chart.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfaceJet {
    pub p: DPoint,
    pub ds: DVector,
    pub dt: DVector,
    pub dss: DVector,
    pub dst: DVector,
    pub dtt: DVector,
}

impl SurfaceJet {
    /// Pull the jet back through a chart `(u, v) → (s, t)`.
    pub fn pullback(&self, chart: &Chart2) -> SurfaceJet {
        let [su, sv] = chart.j[0];
        let [tu, tv] = chart.j[1];
        let du = self.ds * su + self.dt * tu;
        let dv = self.ds * sv + self.dt * tv;
        let second = |a_s: f64, a_t: f64, b_s: f64, b_t: f64, hs: f64, ht: f64| {
            self.dss * (a_s * b_s)
                + self.dst * (a_s * b_t + a_t * b_s)
                + self.dtt * (a_t * b_t)
                + self.ds * hs
                + self.dt * ht
        };
        SurfaceJet {
            p: self.p,
            ds: du,
            dt: dv,
            dss: second(su, tu, su, tu, chart.h_s[0][0], chart.h_t[0][0]),
            dst: second(su, tu, sv, tv, chart.h_s[0][1], chart.h_t[0][1]),
            dtt: second(sv, tv, sv, tv, chart.h_s[1][1], chart.h_t[1][1]),
        }
    }
}

/// Uniform cubic B-spline basis and its first two derivatives at `x`.
fn basis(x: f64) -> ([f64; 4], [f64; 4], [f64; 4]) {
    let x2 = x * x;
    let x3 = x2 * x;
    let b = [
        (1.0 - 3.0 * x + 3.0 * x2 - x3) / 6.0,
        (4.0 - 6.0 * x2 + 3.0 * x3) / 6.0,
        (1.0 + 3.0 * x + 3.0 * x2 - 3.0 * x3) / 6.0,
        x3 / 6.0,
    ];
    let d = [
        (-1.0 + 2.0 * x - x2) / 2.0,
        (-4.0 * x + 3.0 * x2) / 2.0,
        (1.0 + 2.0 * x - 3.0 * x2) / 2.0,
        x2 / 2.0,
    ];
    let dd = [1.0 - x, -2.0 + 3.0 * x, 1.0 - 3.0 * x, x];
    (b, d, dd)
}

/// Evaluate the bicubic patch of a 4×4 net at `(s, t) ∈ [0,1]²`.
///
/// `net[i][j]` runs `i` along `s` and `j` along `t`; the patch interior
/// corresponds to the inner 2×2 of the net.
pub(crate) fn eval_bspline(net: &[[DPoint; 4]; 4], s: f64, t: f64) -> SurfaceJet {
    let (bs, ds, dds) = basis(s);
    let (bt, dt, ddt) = basis(t);

    let mut p = DVector::zeros();
    let mut js = DVector::zeros();
    let mut jt = DVector::zeros();
    let mut hss = DVector::zeros();
    let mut hst = DVector::zeros();
    let mut htt = DVector::zeros();
    for i in 0..4 {
        for j in 0..4 {
            let c = net[i][j].coords;
            p += c * (bs[i] * bt[j]);
            js += c * (ds[i] * bt[j]);
            jt += c * (bs[i] * dt[j]);
            hss += c * (dds[i] * bt[j]);
            hst += c * (ds[i] * dt[j]);
            htt += c * (bs[i] * ddt[j]);
        }
    }
    SurfaceJet {
        p: DPoint::from(p),
        ds: js,
        dt: jt,
        dss: hss,
        dst: hst,
        dtt: htt,
    }
}

/// Is the limit over quad `q` a plain bicubic B-spline of its 4×4
/// neighborhood?
///
/// Requires every corner to be an ordinary smooth interior vertex
/// (valence 4), a regular boundary vertex (two faces), or a cage corner
/// (one face), with no semi-sharp edge incident to any corner.
pub(crate) fn is_regular(mesh: &SubdMesh, q: u32) -> bool {
    let verts = &mesh.faces[q as usize];
    if verts.len() != 4 {
        return false;
    }
    for &v in verts {
        if mesh.has_sharp_incident_edge(v) {
            return false;
        }
        let faces = mesh.vert_faces[v as usize].len();
        if mesh.is_boundary_vertex(v) {
            if faces > 2 {
                return false;
            }
            if mesh.boundary_edge_count(v) != 2 {
                return false;
            }
        } else if faces != 4 || mesh.valence(v) != 4 {
            return false;
        }
    }
    true
}

/// The two far vertices of the quad across edge `(a, b)` from `q`,
/// ordered (adjacent-to-`a`, adjacent-to-`b`).
fn far_pair(mesh: &SubdMesh, q: u32, a: u32, b: u32) -> Option<(u32, u32)> {
    let g = mesh.face_across(a, b, q)?;
    let verts = &mesh.faces[g as usize];
    let n = verts.len();
    // g traverses the shared edge as (b, a).
    let i = verts.iter().position(|&w| w == b)?;
    if verts[(i + 1) % n] != a || n != 4 {
        return None;
    }
    Some((verts[(i + 2) % n], verts[(i + 3) % n]))
}

/// The vertex diagonally opposite `c` in the face that touches quad `q`
/// only at `c`.
fn diagonal_vertex(mesh: &SubdMesh, q: u32, c: u32, n1: u32, n2: u32) -> Option<u32> {
    let f1 = mesh.face_across(c, n1, q);
    let f2 = mesh.face_across(c, n2, q);
    for &g in &mesh.vert_faces[c as usize] {
        if Some(g) == f1 || Some(g) == f2 || g == q {
            continue;
        }
        let verts = &mesh.faces[g as usize];
        let i = verts.iter().position(|&w| w == c)?;
        return Some(verts[(i + 2) % verts.len()]);
    }
    None
}

/// Extract the 4×4 control net of a regular quad, synthesizing phantom
/// points by reflection across hard boundaries.
pub(crate) fn extract_net(mesh: &SubdMesh, q: u32) -> [[DPoint; 4]; 4] {
    let verts = &mesh.faces[q as usize];
    let [c0, c1, c2, c3] = [verts[0], verts[1], verts[2], verts[3]];
    let pos = |v: u32| mesh.positions[v as usize];

    let mut net = [[DPoint::origin(); 4]; 4];
    let mut have = [[false; 4]; 4];
    let set = |net: &mut [[DPoint; 4]; 4], have: &mut [[bool; 4]; 4], i: usize, j: usize, p: DPoint| {
        net[i][j] = p;
        have[i][j] = true;
    };

    set(&mut net, &mut have, 1, 1, pos(c0));
    set(&mut net, &mut have, 2, 1, pos(c1));
    set(&mut net, &mut have, 2, 2, pos(c2));
    set(&mut net, &mut have, 1, 2, pos(c3));

    // Side neighbors: bottom (t−), right (s+), top (t+), left (s−).
    if let Some((x, y)) = far_pair(mesh, q, c0, c1) {
        set(&mut net, &mut have, 1, 0, pos(x));
        set(&mut net, &mut have, 2, 0, pos(y));
    }
    if let Some((x, y)) = far_pair(mesh, q, c1, c2) {
        set(&mut net, &mut have, 3, 1, pos(x));
        set(&mut net, &mut have, 3, 2, pos(y));
    }
    if let Some((x, y)) = far_pair(mesh, q, c2, c3) {
        set(&mut net, &mut have, 2, 3, pos(x));
        set(&mut net, &mut have, 1, 3, pos(y));
    }
    if let Some((x, y)) = far_pair(mesh, q, c3, c0) {
        set(&mut net, &mut have, 0, 2, pos(x));
        set(&mut net, &mut have, 0, 1, pos(y));
    }

    // Remember which sides came from real neighbors before reflection
    // fills the gaps: bottom, right, top, left.
    let side_real = [have[1][0], have[3][1], have[1][3], have[0][1]];

    // Reflect missing side rows/columns through the interior.
    let reflect = |net: &mut [[DPoint; 4]; 4],
                   have: &mut [[bool; 4]; 4],
                   targets: [(usize, usize); 2],
                   mids: [(usize, usize); 2],
                   fars: [(usize, usize); 2]| {
        for k in 0..2 {
            if !have[targets[k].0][targets[k].1] {
                let m = net[mids[k].0][mids[k].1].coords;
                let f = net[fars[k].0][fars[k].1].coords;
                net[targets[k].0][targets[k].1] = DPoint::from(2.0 * m - f);
                have[targets[k].0][targets[k].1] = true;
            }
        }
    };
    reflect(&mut net, &mut have, [(1, 0), (2, 0)], [(1, 1), (2, 1)], [(1, 2), (2, 2)]);
    reflect(&mut net, &mut have, [(3, 1), (3, 2)], [(2, 1), (2, 2)], [(1, 1), (1, 2)]);
    reflect(&mut net, &mut have, [(1, 3), (2, 3)], [(1, 2), (2, 2)], [(1, 1), (2, 1)]);
    reflect(&mut net, &mut have, [(0, 1), (0, 2)], [(1, 1), (1, 2)], [(2, 1), (2, 2)]);

    // Corner points: the diagonal vertex where it exists, otherwise a
    // reflection across whichever adjacent side is a hard boundary. The
    // non-boundary side's column/row is complete by now, so the
    // reflection is well defined either way.
    let corner_info: [(usize, usize, u32, u32, u32, usize); 4] = [
        // (i, j, corner, s-neighbor, t-neighbor, adjacent row-side index)
        (0, 0, c0, c1, c3, 0),
        (3, 0, c1, c2, c0, 0),
        (3, 3, c2, c3, c1, 2),
        (0, 3, c3, c0, c2, 2),
    ];
    for &(i, j, c, n1, n2, row_side) in &corner_info {
        if !mesh.is_boundary_vertex(c) {
            if let Some(d) = diagonal_vertex(mesh, q, c, n1, n2) {
                set(&mut net, &mut have, i, j, pos(d));
                continue;
            }
        }
        let jm = if j == 0 { (1, 2) } else { (2, 1) };
        let im = if i == 0 { (1, 2) } else { (2, 1) };
        let p = if !side_real[row_side] {
            // Row side (bottom/top) missing: reflect in t along column i.
            2.0 * net[i][jm.0].coords - net[i][jm.1].coords
        } else {
            // Column side missing: reflect in s along row j.
            2.0 * net[im.0][j].coords - net[im.1][j].coords
        };
        set(&mut net, &mut have, i, j, DPoint::from(p));
    }

    net
}
