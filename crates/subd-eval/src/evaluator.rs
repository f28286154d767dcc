//! The public limit-surface evaluator.

use cast_types::{
    to_point, to_vector, CancelToken, ControlCage, DPoint, DVector, Point, TessellationResult,
    Vector,
};
use uuid::Uuid;

use crate::chart::{quad_select, tri_select};
use crate::descent::{descend, vertex_limit, DescentResult};
use crate::error::EvalError;
use crate::mesh::SubdMesh;
use crate::patch::{eval_bspline, extract_net, is_regular, SurfaceJet};
use crate::refine::TopologyRefiner;

/// Position and first derivatives at `(face, u, v)`, in evaluation
/// precision.
#[derive(Debug, Clone, Copy)]
pub struct LimitDerivatives {
    pub point: DPoint,
    pub du: DVector,
    pub dv: DVector,
}

/// Position with first and second derivatives at `(face, u, v)`.
#[derive(Debug, Clone, Copy)]
pub struct LimitSecondDerivatives {
    pub point: DPoint,
    pub du: DVector,
    pub dv: DVector,
    pub duu: DVector,
    pub dvv: DVector,
    pub duv: DVector,
}

/// Orthonormal tangent frame at a surface point.
#[derive(Debug, Clone, Copy)]
pub struct TangentFrame {
    pub t_u: Vector,
    pub t_v: Vector,
    pub normal: Vector,
}

pub(crate) struct EvalState {
    pub cage_id: Uuid,
    pub base: SubdMesh,
    pub base_faces: Vec<Vec<u32>>,
    pub level2: SubdMesh,
    /// Level-1 child face ids per base face corner.
    pub l1_children: Vec<Vec<u32>>,
    /// Level-2 child face ids per level-1 face corner.
    pub l2_children: Vec<Vec<u32>>,
    /// Level-2 vertex descending from each cage vertex.
    pub l2_vertex_of_cage: Vec<u32>,
    /// Regularity classification per level-2 quad.
    pub regular: Vec<bool>,
}

/// Exact Catmull-Clark limit-surface evaluator.
///
/// `initialize` consumes a one-shot topology refiner to build a
/// feature-isolating patch representation; afterwards any number of
/// point, derivative, and tessellation queries may be answered from the
/// same instance, at any tessellation level. Re-initialization is
/// refused; build a fresh evaluator for fresh topology.
#[derive(Default)]
pub struct SubdEvaluator {
    state: Option<EvalState>,
}

impl SubdEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Build refiner and patch tables for `cage`.
    pub fn initialize(&mut self, cage: &ControlCage) -> Result<(), EvalError> {
        if self.state.is_some() {
            return Err(EvalError::AlreadyRefined);
        }
        let base = SubdMesh::from_cage(cage)?;
        let mut refiner = TopologyRefiner::new(base.clone());
        let topo = refiner.refine()?;

        let l2_vertex_of_cage = (0..cage.vertex_count())
            .map(|v| topo.level2.vertex_children[topo.level1.vertex_children[v] as usize])
            .collect();
        let regular = (0..topo.level2.mesh.face_count() as u32)
            .map(|q| is_regular(&topo.level2.mesh, q))
            .collect();

        tracing::debug!(
            faces = cage.face_count(),
            level2_quads = topo.level2.mesh.face_count(),
            "evaluator initialized"
        );

        self.state = Some(EvalState {
            cage_id: cage.id(),
            base,
            base_faces: cage.faces().to_vec(),
            level2: topo.level2.mesh,
            l1_children: topo.level1.children,
            l2_children: topo.level2.children,
            l2_vertex_of_cage,
            regular,
        });
        Ok(())
    }

    pub(crate) fn state(&self) -> Result<&EvalState, EvalError> {
        self.state.as_ref().ok_or(EvalError::NotInitialized)
    }

    /// Structural identity of the initialized cage.
    pub fn cage_id(&self) -> Result<Uuid, EvalError> {
        Ok(self.state()?.cage_id)
    }

    pub fn face_count(&self) -> Result<usize, EvalError> {
        Ok(self.state()?.base_faces.len())
    }

    fn check_params(&self, face: u32, u: f32, v: f32) -> Result<&EvalState, EvalError> {
        let state = self.state()?;
        if face as usize >= state.base_faces.len() {
            return Err(EvalError::InvalidFace { face });
        }
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return Err(EvalError::ParameterOutOfRange { u, v });
        }
        Ok(state)
    }

    /// Raw evaluation; `Corner` means the parameter pins an irregular
    /// vertex whose jet does not exist in closed form.
    pub(crate) fn eval_raw(state: &EvalState, face: u32, u: f64, v: f64) -> RawEval {
        let arity = state.base_faces[face as usize].len();
        let (k1, chart1) = if arity == 4 {
            quad_select(u, v)
        } else {
            tri_select(u, v)
        };
        let l1_face = state.l1_children[face as usize][k1];
        let (k2, local) = quad_select(chart1.s, chart1.t);
        let chart = chart1.then_affine(local.s, local.t, local.j);
        let q = state.l2_children[l1_face as usize][k2];

        if state.regular[q as usize] {
            let net = extract_net(&state.level2, q);
            return RawEval::Jet(eval_bspline(&net, chart.s, chart.t).pullback(&chart));
        }
        match descend(&state.level2, q, chart.s, chart.t) {
            DescentResult::Patch(jet) => RawEval::Jet(jet.pullback(&chart)),
            DescentResult::Corner { vertex } => RawEval::Corner { vertex },
        }
    }

    /// Evaluate, resolving pinned irregular corners by nudging the
    /// parameter toward the face center.
    pub(crate) fn eval_jet(state: &EvalState, face: u32, u: f64, v: f64) -> SurfaceJet {
        let (mut u, mut v) = (u, v);
        for _attempt in 0..4 {
            match Self::eval_raw(state, face, u, v) {
                RawEval::Jet(jet) => return jet,
                RawEval::Corner { .. } => {
                    u += (0.5 - u) * 1e-9;
                    v += (0.5 - v) * 1e-9;
                }
            }
        }
        // Unreachable in practice: one nudge moves off every corner.
        match Self::eval_raw(state, face, 0.5, 0.5) {
            RawEval::Jet(jet) => jet,
            RawEval::Corner { .. } => unreachable!("face center cannot pin a corner"),
        }
    }

    /// Limit position and normal used for pinned corners and
    /// tessellation corner samples.
    pub(crate) fn corner_sample(
        state: &EvalState,
        face: u32,
        u: f64,
        v: f64,
        vertex: u32,
    ) -> (DPoint, DVector) {
        if let Some((point, normal)) = vertex_limit(&state.level2, vertex) {
            if let Some(normal) = normal {
                return (point, normal);
            }
            let jet = Self::eval_jet(state, face, u, v);
            let normal = unit_normal(&jet);
            return (point, normal);
        }
        // Semi-sharp corner: no closed-form mask; nudged evaluation.
        let jet = Self::eval_jet(state, face, u, v);
        (jet.p, unit_normal(&jet))
    }

    pub fn evaluate_limit_point(&self, face: u32, u: f32, v: f32) -> Result<Point, EvalError> {
        let state = self.check_params(face, u, v)?;
        match Self::eval_raw(state, face, u as f64, v as f64) {
            RawEval::Jet(jet) => Ok(to_point(&jet.p)),
            RawEval::Corner { vertex } => {
                let (p, _) = Self::corner_sample(state, face, u as f64, v as f64, vertex);
                Ok(to_point(&p))
            }
        }
    }

    pub fn evaluate_limit(&self, face: u32, u: f32, v: f32) -> Result<(Point, Vector), EvalError> {
        let state = self.check_params(face, u, v)?;
        match Self::eval_raw(state, face, u as f64, v as f64) {
            RawEval::Jet(jet) => Ok((to_point(&jet.p), to_vector(&unit_normal(&jet)))),
            RawEval::Corner { vertex } => {
                let (p, n) = Self::corner_sample(state, face, u as f64, v as f64, vertex);
                Ok((to_point(&p), to_vector(&n)))
            }
        }
    }

    pub fn evaluate_limit_with_derivatives(
        &self,
        face: u32,
        u: f32,
        v: f32,
    ) -> Result<LimitDerivatives, EvalError> {
        let state = self.check_params(face, u, v)?;
        let jet = Self::eval_jet(state, face, u as f64, v as f64);
        Ok(LimitDerivatives {
            point: jet.p,
            du: jet.ds,
            dv: jet.dt,
        })
    }

    pub fn evaluate_limit_with_second_derivatives(
        &self,
        face: u32,
        u: f32,
        v: f32,
    ) -> Result<LimitSecondDerivatives, EvalError> {
        let state = self.check_params(face, u, v)?;
        let jet = Self::eval_jet(state, face, u as f64, v as f64);
        Ok(LimitSecondDerivatives {
            point: jet.p,
            du: jet.ds,
            dv: jet.dt,
            duu: jet.dss,
            dvv: jet.dtt,
            duv: jet.dst,
        })
    }

    /// Orthonormalized tangent frame `(T_u, T_v, N)`.
    pub fn compute_tangent_frame(
        &self,
        face: u32,
        u: f32,
        v: f32,
    ) -> Result<TangentFrame, EvalError> {
        let state = self.check_params(face, u, v)?;
        let jet = Self::eval_jet(state, face, u as f64, v as f64);
        let normal = unit_normal(&jet);
        let t_u = jet.ds.normalize();
        let t_v = normal.cross(&t_u);
        Ok(TangentFrame {
            t_u: to_vector(&t_u),
            t_v: to_vector(&t_v),
            normal: to_vector(&normal),
        })
    }

    /// Evaluate many parameters at once. Shares the patch tables across
    /// queries and packs the result; triangles are left empty.
    pub fn batch_evaluate_limit(
        &self,
        faces: &[u32],
        us: &[f32],
        vs: &[f32],
        cancel: Option<&CancelToken>,
    ) -> Result<TessellationResult, EvalError> {
        if faces.len() != us.len() || faces.len() != vs.len() {
            return Err(EvalError::InvalidCage {
                reason: format!(
                    "batch arrays disagree in length: {} faces, {} us, {} vs",
                    faces.len(),
                    us.len(),
                    vs.len()
                ),
            });
        }
        let mut vertices = Vec::with_capacity(faces.len());
        let mut normals = Vec::with_capacity(faces.len());
        for (i, &face) in faces.iter().enumerate() {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(EvalError::Cancelled);
                }
            }
            let (p, n) = self.evaluate_limit(face, us[i], vs[i])?;
            vertices.push(p);
            normals.push(n);
        }
        Ok(TessellationResult {
            vertices,
            normals,
            triangles: Vec::new(),
            parent_face: Vec::new(),
        })
    }

    /// Triangulate the limit surface. See `tessellate` module docs for
    /// the density contract.
    pub fn tessellate(
        &self,
        level: u8,
        adaptive: bool,
    ) -> Result<TessellationResult, EvalError> {
        let state = self.state()?;
        crate::tessellate::tessellate(state, level, adaptive)
    }
}

pub(crate) enum RawEval {
    Jet(SurfaceJet),
    Corner { vertex: u32 },
}

/// Unit normal of a jet, `du × dv` normalized.
pub(crate) fn unit_normal(jet: &SurfaceJet) -> DVector {
    let n = jet.ds.cross(&jet.dt);
    let len = n.norm();
    if len > 1e-30 {
        n / len
    } else {
        DVector::z()
    }
}
