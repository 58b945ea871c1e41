// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

#[cfg(feature = "cpu-exec")]
mod cpu {
    use std::sync::Arc;

    use mind_lazy::exec::CpuBackend;
    use mind_lazy::ir::{ops, BinOp};
    use mind_lazy::pipeline::LazyGraphExecutor;
    use mind_lazy::runtime::{BackendRegistry, ErrorKind, HostTensor, Residency, VirtualDevice};
    use mind_lazy::types::{Scalar, ScalarType};

    fn executor() -> LazyGraphExecutor {
        let registry = BackendRegistry::new();
        registry.register(Arc::new(CpuBackend::new())).unwrap();
        LazyGraphExecutor::from_registry(&registry).unwrap()
    }

    fn tensor(values: &[f32]) -> HostTensor {
        HostTensor::from_slice(vec![values.len()], values).unwrap()
    }

    #[test]
    fn executor_requires_a_registered_backend() {
        let err = LazyGraphExecutor::from_registry(&BackendRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn sync_fills_placeholders() {
        let executor = executor();
        let device = VirtualDevice::Lazy(0);
        let node = ops::scalar_of_type(Scalar::Float(3.5), ScalarType::F32);
        let handles = executor.sync(&[node], &device).unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].residency(), Residency::Materialized);
        let host = executor.materialize(&handles[0], None).unwrap();
        assert_eq!(host.item().unwrap(), Scalar::Float(3.5));
    }

    #[test]
    fn second_sync_with_new_data_hits_the_cache() {
        let executor = executor();
        let device = VirtualDevice::Lazy(0);

        let run = |a: &[f32], b: &[f32]| {
            let x = executor.to_device(&tensor(a), &device).unwrap();
            let y = executor.to_device(&tensor(b), &device).unwrap();
            let sum = ops::binary(BinOp::Add, x.into(), y.into());
            let out = executor.sync(&[sum], &device).unwrap();
            executor.materialize(&out[0], None).unwrap().to_vec::<f32>().unwrap()
        };

        assert_eq!(run(&[1.0, 2.0], &[10.0, 20.0]), vec![11.0, 22.0]);
        assert_eq!(executor.cache_len(), 1);
        assert_eq!(run(&[3.0, 4.0], &[0.5, 0.5]), vec![3.5, 4.5]);
        assert_eq!(executor.cache_len(), 1);

        executor.clear_cache();
        assert_eq!(executor.cache_len(), 0);
    }

    #[test]
    fn synced_results_feed_later_graphs() {
        let executor = executor();
        let device = VirtualDevice::Lazy(0);
        let x = executor.to_device(&tensor(&[2.0, 4.0]), &device).unwrap();
        let doubled = ops::binary(BinOp::Add, x.clone().into(), x.into());
        let first = executor.sync(&[doubled], &device).unwrap();

        let reused = ops::device_data(Arc::clone(&first[0]));
        let halved = ops::binary(
            BinOp::Div,
            reused.into(),
            ops::scalar(Scalar::Float(4.0), first[0].shape().clone()).into(),
        );
        let second = executor.sync(&[halved], &device).unwrap();
        let out = executor.materialize(&second[0], None).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn multiple_roots_return_in_order() {
        let executor = executor();
        let device = VirtualDevice::Lazy(0);
        let x = executor.to_device(&tensor(&[1.0, 2.0]), &device).unwrap();
        let y = executor.to_device(&tensor(&[5.0, 5.0]), &device).unwrap();
        let diff = ops::binary(BinOp::Sub, y.clone().into(), x.clone().into());
        let prod = ops::binary(BinOp::Mul, x.into(), y.into());

        let out = executor.sync(&[prod, diff], &device).unwrap();
        let values: Vec<Vec<f32>> = out
            .iter()
            .map(|h| executor.materialize(h, None).unwrap().to_vec::<f32>().unwrap())
            .collect();
        assert_eq!(values, vec![vec![5.0, 10.0], vec![4.0, 3.0]]);
    }

    #[test]
    fn execution_errors_surface_from_sync() {
        let executor = executor();
        let device = VirtualDevice::Lazy(0);
        let one = ops::scalar_of_type(Scalar::Int(1), ScalarType::I64);
        let zero = ops::scalar_of_type(Scalar::Int(0), ScalarType::I64);
        let div = ops::binary(BinOp::Div, one.into(), zero.into());
        let err = executor.sync(&[div], &device).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn materialize_can_cast() {
        let executor = executor();
        let node = ops::scalar_of_type(Scalar::Float(7.9), ScalarType::F64);
        let out = executor.sync(&[node], &VirtualDevice::Lazy(0)).unwrap();
        let as_int = executor.materialize(&out[0], Some(ScalarType::I32)).unwrap();
        assert_eq!(as_int.item().unwrap(), Scalar::Int(7));
    }
}
