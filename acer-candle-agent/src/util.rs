//! Utilities.
use acer_core::ObsBatch;
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, Device, Tensor, Var};
use candle_nn::VarMap;
use log::trace;

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("track, tau = {}", tau);
    let dest = dest.data().lock().map_err(|_| anyhow!("poisoned varmap"))?;
    let src = src.data().lock().map_err(|_| anyhow!("poisoned varmap"))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("variable {} is not in the source varmap", k_dest))?;
        let t_src = v_src.as_tensor().affine(tau, 0.0)?;
        let t_dest = v_dest.as_tensor().affine(1.0 - tau, 0.0)?;
        v_dest.set(&(t_src + t_dest)?)?;
    }

    Ok(())
}

/// Converts a batch of observations to a tensor of shape `obs.shape`.
pub fn obs_to_tensor(obs: &ObsBatch, device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(obs.data.as_slice(), obs.shape.as_slice(), device)?)
}

/// Global L2 norm of the gradients of `vars`. Missing gradients count as zeros.
pub fn global_norm(grads: &GradStore, vars: &[Var]) -> Result<f32> {
    let mut sum = 0f32;
    for var in vars.iter() {
        if let Some(g) = grads.get(var.as_tensor()) {
            sum += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    Ok(sum.sqrt())
}

/// Scales the gradients of `vars` by `max_norm / max(norm, max_norm)`.
///
/// Returns the global norm before clipping.
pub fn clip_by_global_norm(grads: &mut GradStore, vars: &[Var], max_norm: f32) -> Result<f32> {
    let norm = global_norm(grads, vars)?;
    let scale = max_norm / norm.max(max_norm);

    if scale < 1.0 {
        for var in vars.iter() {
            if let Some(g) = grads.get(var.as_tensor()) {
                let g = g.affine(scale as f64, 0.0)?;
                grads.insert(var.as_tensor(), g);
            }
        }
    }

    Ok(norm)
}

/// Adds the gradients in `src` to those in `dest`, variable by variable.
///
/// A gradient missing from one of the stores counts as zeros of the variable's shape.
pub fn add_grads(dest: &mut GradStore, src: &GradStore, vars: &[Var]) -> Result<()> {
    for var in vars.iter() {
        let t = var.as_tensor();
        let sum = match (dest.get(t), src.get(t)) {
            (Some(g1), Some(g2)) => (g1 + g2)?,
            (None, Some(g2)) => g2.clone(),
            (_, None) => continue,
        };
        dest.insert(t, sum);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;

    fn varmap_with(values: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((values.len(),), "var1", init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(values, (values.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(&t)?;
        Ok(vm)
    }

    fn var1(vm: &VarMap) -> Vec<f32> {
        vm.data().lock().unwrap().get("var1").unwrap().as_tensor().to_vec1().unwrap()
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let vm_src = varmap_with(&[1.0, 2.0, 3.0])?;
        let vm_dest = varmap_with(&[4.0, 5.0, 6.0])?;
        track(&vm_dest, &vm_src, tau)?;

        let expected = [1.9f32, 2.9, 3.9];
        for (a, b) in var1(&vm_dest).iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        assert_eq!(var1(&vm_src), vec![1.0, 2.0, 3.0]);

        // tau = 1 copies the source
        track(&vm_dest, &vm_src, 1.0)?;
        assert_eq!(var1(&vm_dest), vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_clip_by_global_norm() -> Result<()> {
        let a = Var::from_tensor(&Tensor::new(&[0f32, 0.0], &Device::Cpu)?)?;
        let b = Var::from_tensor(&Tensor::new(&[0f32], &Device::Cpu)?)?;
        let vars = vec![a.clone(), b.clone()];

        // d/da (3a0 + 4b) = [3, 0], d/db = [4], global norm 5
        let w = Tensor::new(&[3f32, 0.0], &Device::Cpu)?;
        let loss = ((a.as_tensor() * &w)?.sum_all()? + (b.as_tensor() * 4.0)?.sum_all()?)?;
        let mut grads = loss.backward()?;

        let norm = clip_by_global_norm(&mut grads, &vars, 10.0)?;
        assert!((norm - 5.0).abs() < 1e-5);
        assert!((global_norm(&grads, &vars)? - 5.0).abs() < 1e-5);

        let norm = clip_by_global_norm(&mut grads, &vars, 1.0)?;
        assert!((norm - 5.0).abs() < 1e-5);
        assert!((global_norm(&grads, &vars)? - 1.0).abs() < 1e-5);
        let ga: Vec<f32> = grads.get(a.as_tensor()).unwrap().to_vec1()?;
        assert!((ga[0] - 0.6).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_add_grads() -> Result<()> {
        let a = Var::from_tensor(&Tensor::new(&[1f32, 2.0], &Device::Cpu)?)?;
        let b = Var::from_tensor(&Tensor::new(&[1f32], &Device::Cpu)?)?;
        let vars = vec![a.clone(), b.clone()];

        let mut g1 = a.as_tensor().sum_all()?.backward()?;
        let g2 = ((a.as_tensor() * 2.0)?.sum_all()? + b.as_tensor().sum_all()?)?.backward()?;
        add_grads(&mut g1, &g2, &vars)?;

        let ga: Vec<f32> = g1.get(a.as_tensor()).unwrap().to_vec1()?;
        let gb: Vec<f32> = g1.get(b.as_tensor()).unwrap().to_vec1()?;
        assert_eq!(ga, vec![3.0, 3.0]);
        assert_eq!(gb, vec![1.0]);
        Ok(())
    }
}
